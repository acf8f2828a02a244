//! Integration test: client handshake against a simulated server.
//!
//! Drives `tether_client::do_handshake` over an in-memory duplex stream
//! against the responder in this crate's library, then checks:
//! 1. Fixed key vectors give the recorded transport keys
//! 2. Both sides agree on keys and can exchange encrypted frames
//! 3. A tampered server static or a mismatched certificate aborts the
//!    attempt with no key material persisted
//! 4. The issuer signature is enforced when an issuer key is configured

use ed25519_dalek::SigningKey;
use hex_literal::hex;
use tether_client::{do_handshake, ClientPayload, Error, HandshakeConfig, HandshakeError};
use tether_crypto::keys::KeyPair;
use tether_integration_tests::{key_from_range, ServerSession, SimulatedServer};
use tether_store::{Device, SqlContainer};
use tether_transport::frame::CONN_HEADER;
use tether_transport::{FrameSocket, NoiseSocket, TransportError};
use tether_types::Jid;
use tokio::io::DuplexStream;

const GOLDEN_WRITE_KEY: [u8; 32] =
    hex!("570626073a425329e7b6a383bdaaae1c74fffbbe618462db6912c60b928c5096");
const GOLDEN_READ_KEY: [u8; 32] =
    hex!("0be9e4d99c1dc367ec34848f2fc901dabe8bbcf0fad3aa716606b460b277efd2");

type ClientOutcome = tether_client::Result<tether_client::HandshakeOutcome<DuplexStream>>;

async fn run(
    server: SimulatedServer,
    device: &mut Device,
    ephemeral: KeyPair,
    config: &HandshakeConfig,
) -> (ClientOutcome, tether_transport::Result<ServerSession>) {
    let (client_stream, server_stream) = tokio::io::duplex(64 * 1024);
    let frames = FrameSocket::new(client_stream, &CONN_HEADER);
    tokio::join!(
        do_handshake(frames, device, ephemeral, config),
        server.accept(server_stream)
    )
}

fn paired_jid() -> Jid {
    Jid::device("491701234567", 3)
}

#[tokio::test]
async fn test_fixed_vectors_produce_golden_keys() {
    let container = SqlContainer::open_memory().expect("open store");
    let mut device = container.new_device();
    device.noise_key = Some(key_from_range(97));

    let server = SimulatedServer::new(key_from_range(33), key_from_range(65));
    let (client, server) = run(
        server,
        &mut device,
        key_from_range(1),
        &HandshakeConfig::default(),
    )
    .await;
    let client = client.expect("client handshake");
    let server = server.expect("server handshake");

    assert_eq!(client.keys.write_key(), &GOLDEN_WRITE_KEY);
    assert_eq!(client.keys.read_key(), &GOLDEN_READ_KEY);
    assert_eq!(server.keys.read_key(), &GOLDEN_WRITE_KEY);
    assert_eq!(server.keys.write_key(), &GOLDEN_READ_KEY);

    assert_eq!(&server.client_static, key_from_range(97).public());
    assert_eq!(&client.server_static, key_from_range(65).public());
}

#[tokio::test]
async fn test_unpaired_device_sends_registration() {
    let container = SqlContainer::open_memory().expect("open store");
    let mut device = container.new_device();

    let (client, server) = run(
        SimulatedServer::random(),
        &mut device,
        KeyPair::generate(),
        &HandshakeConfig::default(),
    )
    .await;
    client.expect("client handshake");
    let server = server.expect("server handshake");

    match server.payload {
        ClientPayload::Registration {
            registration_id,
            identity_key,
            signed_pre_key_id,
            ..
        } => {
            assert_ne!(registration_id, 0);
            assert_eq!(registration_id, device.registration_id);
            assert_eq!(
                &identity_key,
                device.identity_key.as_ref().expect("identity").public()
            );
            assert_eq!(signed_pre_key_id, 1);
        }
        other => panic!("expected registration, got {other:?}"),
    }
    assert_eq!(
        &server.client_static,
        device.noise_key.as_ref().expect("noise key").public()
    );
}

#[tokio::test]
async fn test_paired_device_logs_in_and_persists_material() {
    let container = SqlContainer::open_memory().expect("open store");
    let mut device = container.new_device();
    device.id = Some(paired_jid());

    let (client, server) = run(
        SimulatedServer::random(),
        &mut device,
        KeyPair::generate(),
        &HandshakeConfig::default(),
    )
    .await;
    client.expect("client handshake");
    let server = server.expect("server handshake");

    assert_eq!(
        server.payload,
        ClientPayload::Login {
            user: "491701234567".into(),
            device: 3,
            passive: true,
        }
    );

    let stored = container
        .get_device(&paired_jid())
        .expect("get device")
        .expect("device saved during handshake");
    assert_eq!(
        stored.noise_key.as_ref().expect("noise").public(),
        &server.client_static
    );
    assert!(device.is_initialized());
}

#[tokio::test]
async fn test_encrypted_exchange_after_handshake() {
    let container = SqlContainer::open_memory().expect("open store");
    let mut device = container.new_device();

    let (client, server) = run(
        SimulatedServer::random(),
        &mut device,
        KeyPair::generate(),
        &HandshakeConfig::default(),
    )
    .await;
    let mut client = client.expect("client handshake").into_socket();
    let server = server.expect("server handshake");
    let mut server = NoiseSocket::new(server.frames, &server.keys);

    client.send_frame(b"first").await.expect("send");
    client.send_frame(b"second").await.expect("send");
    assert_eq!(server.recv().await.expect("recv"), b"first");
    assert_eq!(server.recv().await.expect("recv"), b"second");

    server.send_frame(b"reply").await.expect("send");
    assert_eq!(client.recv().await.expect("recv"), b"reply");

    server.close().await.expect("close");
    assert!(matches!(client.recv().await, Err(TransportError::Closed)));
}

#[tokio::test]
async fn test_tampered_server_static_aborts_before_persisting() {
    // 32-byte key plus 16-byte tag.
    for index in [0usize, 15, 31, 32, 47] {
        let container = SqlContainer::open_memory().expect("open store");
        let mut device = container.new_device();
        device.id = Some(paired_jid());

        let server = SimulatedServer::random().flip_static_ciphertext(index);
        let (client, server) = run(
            server,
            &mut device,
            KeyPair::generate(),
            &HandshakeConfig::default(),
        )
        .await;

        assert!(
            matches!(
                client,
                Err(Error::Handshake(HandshakeError::Decrypt {
                    stage: "server static",
                    ..
                }))
            ),
            "byte {index}"
        );
        assert!(server.is_err(), "server must not complete");
        assert!(device.noise_key.is_none());
        assert!(device.identity_key.is_none());
        assert!(container
            .get_device(&paired_jid())
            .expect("get device")
            .is_none());
    }
}

#[tokio::test]
async fn test_certificate_mismatch_yields_no_keys() {
    let container = SqlContainer::open_memory().expect("open store");
    let mut device = container.new_device();
    device.id = Some(paired_jid());

    let server = SimulatedServer::random().certify(*KeyPair::generate().public());
    let (client, _server) = run(
        server,
        &mut device,
        KeyPair::generate(),
        &HandshakeConfig::default(),
    )
    .await;

    let err = match client {
        Ok(_) => panic!("handshake must fail"),
        Err(err) => err,
    };
    assert!(matches!(
        err,
        Error::Handshake(HandshakeError::CertificateMismatch)
    ));
    assert_eq!(err.kind(), tether_client::ErrorKind::Handshake);
    assert!(device.noise_key.is_none());
    assert!(container.get_all_devices().expect("list").is_empty());
}

#[tokio::test]
async fn test_issuer_signature_checked_when_configured() {
    let container = SqlContainer::open_memory().expect("open store");

    let trusted = SimulatedServer::random();
    let config = HandshakeConfig {
        issuer_key: Some(trusted.issuer_public()),
        ..HandshakeConfig::default()
    };

    let mut device = container.new_device();
    let (client, server) = run(trusted, &mut device, KeyPair::generate(), &config).await;
    client.expect("trusted issuer accepted");
    server.expect("server handshake");

    let rogue = SimulatedServer::random().with_issuer(SigningKey::from_bytes(&[0x01; 32]));
    let mut device = container.new_device();
    let (client, _server) = run(rogue, &mut device, KeyPair::generate(), &config).await;
    assert!(matches!(
        client,
        Err(Error::Handshake(HandshakeError::CertificateSignature(_)))
    ));
    assert!(device.noise_key.is_none());
}

#[tokio::test]
async fn test_untrusted_issuer_passes_without_configured_key() {
    let container = SqlContainer::open_memory().expect("open store");
    let mut device = container.new_device();

    let rogue = SimulatedServer::random().with_issuer(SigningKey::from_bytes(&[0x01; 32]));
    let (client, _server) = run(
        rogue,
        &mut device,
        KeyPair::generate(),
        &HandshakeConfig::default(),
    )
    .await;
    client.expect("only the certified key is checked");
}
