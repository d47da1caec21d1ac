use std::{borrow::Cow, fmt, io::BufReader, path::PathBuf, sync::Arc};

use openssl::{pkcs12::Pkcs12, pkey::PKey, x509::X509};
use tokio_rustls::{
    rustls::{
        pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer},
        ClientConfig, RootCertStore,
    },
    TlsConnector,
};
use tracing::debug;

use crate::error::CredentialError;

const KEYSTORE: &str = "keystore";
const TRUSTSTORE: &str = "truststore";

/// Where key material is loaded from.
#[derive(Clone, PartialEq, Eq)]
pub enum KeySource {
    File(PathBuf),
    Bytes(Vec<u8>),
}

impl fmt::Debug for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::File(path) => f.debug_tuple("File").field(path).finish(),
            KeySource::Bytes(bytes) => write!(f, "Bytes({} bytes)", bytes.len()),
        }
    }
}

impl From<PathBuf> for KeySource {
    fn from(path: PathBuf) -> Self {
        KeySource::File(path)
    }
}

impl From<&str> for KeySource {
    fn from(path: &str) -> Self {
        KeySource::File(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for KeySource {
    fn from(bytes: Vec<u8>) -> Self {
        KeySource::Bytes(bytes)
    }
}

impl KeySource {
    fn read(&self, store: &'static str) -> Result<Cow<'_, [u8]>, CredentialError> {
        match self {
            KeySource::File(path) => {
                std::fs::read(path)
                    .map(Cow::Owned)
                    .map_err(|source| CredentialError::Read {
                        store,
                        path: path.clone(),
                        source,
                    })
            }
            KeySource::Bytes(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }
}

/// Encoding of a key or trust store, detected from its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Pkcs12,
    Pem,
    /// Java keystore. Recognised only to be refused.
    Jks,
}

const JKS_MAGIC: &[u8] = &[0xFE, 0xED, 0xFE, 0xED];

impl StoreFormat {
    pub fn detect(content: &[u8]) -> StoreFormat {
        if content.starts_with(JKS_MAGIC) {
            return StoreFormat::Jks;
        }
        let start = content
            .iter()
            .position(|b| !b.is_ascii_whitespace())
            .unwrap_or(content.len());
        if content[start..].starts_with(b"-----BEGIN") {
            StoreFormat::Pem
        } else {
            StoreFormat::Pkcs12
        }
    }
}

/// A key or trust store together with the passphrase that unlocks it.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyStore {
    pub source: KeySource,
    pub passphrase: String,
}

impl KeyStore {
    pub fn new(source: impl Into<KeySource>, passphrase: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            passphrase: passphrase.into(),
        }
    }
}

impl fmt::Debug for KeyStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyStore")
            .field("source", &self.source)
            .field("passphrase", &"****")
            .finish()
    }
}

/// Client identity for mutual TLS. Its presence selects TLS with SASL EXTERNAL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsIdentity {
    pub keystore: KeyStore,
    pub truststore: KeyStore,
    pub sasl_external_user: Option<String>,
}

impl TlsIdentity {
    pub fn new(keystore: KeyStore, truststore: KeyStore) -> Self {
        Self {
            keystore,
            truststore,
            sasl_external_user: None,
        }
    }

    pub fn sasl_external_user(mut self, user: impl Into<String>) -> Self {
        self.sasl_external_user = Some(user.into());
        self
    }
}

/// Client side TLS configuration: the keystore identity plus the truststore roots and nothing else.
#[derive(Clone)]
pub struct TlsContext {
    config: Arc<ClientConfig>,
}

impl fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsContext").finish_non_exhaustive()
    }
}

impl TlsContext {
    pub fn build(identity: &TlsIdentity) -> Result<TlsContext, CredentialError> {
        let (chain, key) = load_identity(&identity.keystore)?;
        let roots = load_roots(&identity.truststore)?;

        debug!(
            chain_length = chain.len(),
            trust_anchors = roots.len(),
            "built TLS context"
        );

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(chain, key)?;

        Ok(TlsContext {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> Arc<ClientConfig> {
        self.config.clone()
    }

    pub(crate) fn connector(&self) -> TlsConnector {
        TlsConnector::from(self.config.clone())
    }
}

type Identity = (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>);

fn load_identity(store: &KeyStore) -> Result<Identity, CredentialError> {
    let content = store.source.read(KEYSTORE)?;

    let (chain, key) = match StoreFormat::detect(&content) {
        StoreFormat::Jks => return Err(CredentialError::Jks { store: KEYSTORE }),
        StoreFormat::Pkcs12 => {
            let parsed = parse_pkcs12(KEYSTORE, &content, &store.passphrase)?;
            let key = parsed.pkey.ok_or(CredentialError::Missing {
                store: KEYSTORE,
                missing: "a private key",
            })?;
            let mut certs = parsed.cert.into_iter().collect::<Vec<_>>();
            certs.extend(parsed.ca.into_iter().flatten());

            let chain = certs
                .iter()
                .map(|cert| to_der(KEYSTORE, cert))
                .collect::<Result<Vec<_>, _>>()?;
            let key = key
                .private_key_to_pkcs8()
                .map_err(|err| parse_error(KEYSTORE, err))?;

            (chain, PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key)))
        }
        StoreFormat::Pem => {
            let chain = pem_certs(KEYSTORE, &content)?;
            let key = pem_private_key(&content, &store.passphrase)?;
            (chain, key)
        }
    };

    if chain.is_empty() {
        return Err(CredentialError::Missing {
            store: KEYSTORE,
            missing: "a certificate",
        });
    }

    Ok((chain, key))
}

fn load_roots(store: &KeyStore) -> Result<RootCertStore, CredentialError> {
    let content = store.source.read(TRUSTSTORE)?;

    let certs = match StoreFormat::detect(&content) {
        StoreFormat::Jks => return Err(CredentialError::Jks { store: TRUSTSTORE }),
        StoreFormat::Pkcs12 => {
            let parsed = parse_pkcs12(TRUSTSTORE, &content, &store.passphrase)?;
            parsed
                .cert
                .into_iter()
                .chain(parsed.ca.into_iter().flatten())
                .map(|cert| to_der(TRUSTSTORE, &cert))
                .collect::<Result<Vec<_>, _>>()?
        }
        StoreFormat::Pem => pem_certs(TRUSTSTORE, &content)?,
    };

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots.add(cert)?;
    }

    if roots.is_empty() {
        return Err(CredentialError::EmptyTrustStore);
    }
    Ok(roots)
}

fn parse_pkcs12(
    store: &'static str,
    content: &[u8],
    passphrase: &str,
) -> Result<openssl::pkcs12::ParsedPkcs12_2, CredentialError> {
    Pkcs12::from_der(content)
        .map_err(|err| parse_error(store, err))?
        .parse2(passphrase)
        .map_err(|source| CredentialError::Unlock { store, source })
}

fn pem_certs(
    store: &'static str,
    content: &[u8],
) -> Result<Vec<CertificateDer<'static>>, CredentialError> {
    let mut reader = BufReader::new(content);
    rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| parse_error(store, err))
}

fn pem_private_key(
    content: &[u8],
    passphrase: &str,
) -> Result<PrivateKeyDer<'static>, CredentialError> {
    if passphrase.is_empty() {
        let mut reader = BufReader::new(content);
        return rustls_pemfile::private_key(&mut reader)
            .map_err(|err| parse_error(KEYSTORE, err))?
            .ok_or(CredentialError::Missing {
                store: KEYSTORE,
                missing: "a private key",
            });
    }

    // possibly encrypted, let openssl unlock it
    let key = PKey::private_key_from_pem_passphrase(content, passphrase.as_bytes())
        .map_err(|source| CredentialError::Unlock {
            store: KEYSTORE,
            source,
        })?;
    let key = key
        .private_key_to_pkcs8()
        .map_err(|err| parse_error(KEYSTORE, err))?;
    Ok(PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key)))
}

fn to_der(store: &'static str, cert: &X509) -> Result<CertificateDer<'static>, CredentialError> {
    cert.to_der()
        .map(CertificateDer::from)
        .map_err(|err| parse_error(store, err))
}

fn parse_error(store: &'static str, err: impl fmt::Display) -> CredentialError {
    CredentialError::Parse {
        store,
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use openssl::{
        asn1::Asn1Time,
        bn::BigNum,
        ec::{EcGroup, EcKey},
        hash::MessageDigest,
        nid::Nid,
        pkcs12::Pkcs12,
        pkey::{PKey, Private},
        symm::Cipher,
        x509::{extension::SubjectAlternativeName, X509NameBuilder, X509},
    };

    use super::{KeyStore, StoreFormat, TlsContext, TlsIdentity};
    use crate::error::CredentialError;

    fn self_signed(common_name: &str) -> (PKey<Private>, X509) {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509NameBuilder::new().unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, common_name)
            .unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        let serial = BigNum::from_u32(1).unwrap().to_asn1_integer().unwrap();
        builder.set_serial_number(&serial).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&key).unwrap();
        builder
            .set_not_before(&Asn1Time::days_from_now(0).unwrap())
            .unwrap();
        builder
            .set_not_after(&Asn1Time::days_from_now(1).unwrap())
            .unwrap();
        let san = SubjectAlternativeName::new()
            .dns(common_name)
            .build(&builder.x509v3_context(None, None))
            .unwrap();
        builder.append_extension(san).unwrap();
        builder.sign(&key, MessageDigest::sha256()).unwrap();

        (key, builder.build())
    }

    fn pkcs12(key: &PKey<Private>, cert: &X509, passphrase: &str) -> Vec<u8> {
        Pkcs12::builder()
            .name("client")
            .pkey(key)
            .cert(cert)
            .build2(passphrase)
            .unwrap()
            .to_der()
            .unwrap()
    }

    fn truststore() -> KeyStore {
        let (_, ca) = self_signed("broker-ca");
        KeyStore::new(ca.to_pem().unwrap(), "")
    }

    #[test]
    fn detects_store_format() {
        assert_eq!(
            StoreFormat::Pem,
            StoreFormat::detect(b"\n  -----BEGIN CERTIFICATE-----")
        );
        assert_eq!(StoreFormat::Pkcs12, StoreFormat::detect(&[0x30, 0x82, 0x01]));
        assert_eq!(StoreFormat::Pkcs12, StoreFormat::detect(b""));
        assert_eq!(
            StoreFormat::Jks,
            StoreFormat::detect(&[0xFE, 0xED, 0xFE, 0xED, 0, 0, 0, 2])
        );
    }

    #[test]
    fn jks_truststore_asks_for_a_conversion() {
        let (key, cert) = self_signed("client");
        let keystore = KeyStore::new(pkcs12(&key, &cert, "changeit"), "changeit");
        let jks = vec![0xFE, 0xED, 0xFE, 0xED, 0, 0, 0, 2, 0, 0, 0, 0];
        let truststore = KeyStore::new(jks, "changeit");

        let err = TlsContext::build(&TlsIdentity::new(keystore, truststore)).unwrap_err();

        assert!(matches!(err, CredentialError::Jks { store: "truststore" }));
        assert!(err.to_string().contains("PKCS#12"));
    }

    #[test]
    fn builds_from_pkcs12_keystore() {
        let (key, cert) = self_signed("client");
        let keystore = KeyStore::new(pkcs12(&key, &cert, "changeit"), "changeit");

        let context = TlsContext::build(&TlsIdentity::new(keystore, truststore()));

        assert!(context.is_ok());
    }

    #[test]
    fn builds_from_pem_keystore_with_encrypted_key() {
        let (key, cert) = self_signed("client");
        let mut pem = cert.to_pem().unwrap();
        pem.extend(
            key.private_key_to_pem_pkcs8_passphrase(Cipher::aes_256_cbc(), b"secret")
                .unwrap(),
        );

        let identity = TlsIdentity::new(KeyStore::new(pem, "secret"), truststore());

        assert!(TlsContext::build(&identity).is_ok());
    }

    #[test]
    fn builds_from_pem_keystore_without_passphrase() {
        let (key, cert) = self_signed("client");
        let mut pem = cert.to_pem().unwrap();
        pem.extend(key.private_key_to_pem_pkcs8().unwrap());

        let identity = TlsIdentity::new(KeyStore::new(pem, ""), truststore());

        assert!(TlsContext::build(&identity).is_ok());
    }

    #[test]
    fn wrong_passphrase_is_a_credential_error() {
        let (key, cert) = self_signed("client");
        let keystore = KeyStore::new(pkcs12(&key, &cert, "changeit"), "wrong");

        let err = TlsContext::build(&TlsIdentity::new(keystore, truststore())).unwrap_err();

        assert!(matches!(
            err,
            CredentialError::Unlock {
                store: "keystore",
                ..
            }
        ));
    }

    #[test]
    fn missing_keystore_file_is_a_read_error() {
        let keystore = KeyStore::new("/nonexistent/client.p12", "changeit");

        let err = TlsContext::build(&TlsIdentity::new(keystore, truststore())).unwrap_err();

        assert!(matches!(err, CredentialError::Read { store: "keystore", .. }));
    }

    #[test]
    fn garbage_keystore_is_a_parse_error() {
        let keystore = KeyStore::new(vec![1u8, 2, 3, 4], "changeit");

        let err = TlsContext::build(&TlsIdentity::new(keystore, truststore())).unwrap_err();

        assert!(matches!(err, CredentialError::Parse { store: "keystore", .. }));
    }

    #[test]
    fn pem_keystore_without_key_is_rejected() {
        let (_, cert) = self_signed("client");
        let keystore = KeyStore::new(cert.to_pem().unwrap(), "");

        let err = TlsContext::build(&TlsIdentity::new(keystore, truststore())).unwrap_err();

        assert!(matches!(
            err,
            CredentialError::Missing {
                store: "keystore",
                ..
            }
        ));
    }

    #[test]
    fn empty_truststore_has_no_fallback() {
        let (key, cert) = self_signed("client");
        let keystore = KeyStore::new(pkcs12(&key, &cert, "changeit"), "changeit");
        // PEM, but only a key in it
        let truststore = KeyStore::new(key.private_key_to_pem_pkcs8().unwrap(), "");

        let err = TlsContext::build(&TlsIdentity::new(keystore, truststore)).unwrap_err();

        assert!(matches!(err, CredentialError::EmptyTrustStore));
    }

    #[test]
    fn debug_hides_passphrases() {
        let identity = TlsIdentity::new(
            KeyStore::new("client.p12", "keystore-secret"),
            KeyStore::new("ca.pem", "truststore-secret"),
        );

        let debug = format!("{:?}", identity);

        assert!(!debug.contains("secret"));
    }
}
