/// A single classified recipient specifier.
///
/// Derived from a `<protocol>:<value>` string: `pgp:` carries an identity
/// (email address or name), `jwe:` the contents of a PEM public-key file,
/// `pkcs7:` the contents of a PEM x509 certificate file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipientSpec {
    Pgp(String),
    PublicKey(Vec<u8>),
    Certificate(Vec<u8>),
}

/// The partition of a recipient list into its three backend buckets.
/// Bucket order follows the order specifiers were supplied in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipientSet {
    pub pgp_identities: Vec<String>,
    pub pub_keys: Vec<Vec<u8>>,
    pub certs: Vec<Vec<u8>>,
}

impl RecipientSet {
    pub fn push(&mut self, spec: RecipientSpec) {
        match spec {
            RecipientSpec::Pgp(identity) => self.pgp_identities.push(identity),
            RecipientSpec::PublicKey(key) => self.pub_keys.push(key),
            RecipientSpec::Certificate(cert) => self.certs.push(cert),
        }
    }
}
