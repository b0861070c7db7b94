pub mod ticket_writer;
