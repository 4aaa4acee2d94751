pub mod fd_transport;
