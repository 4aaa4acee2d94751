pub mod openssl_probe;
