pub mod macau_ticket;
