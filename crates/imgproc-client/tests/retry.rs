#![cfg(unix)]

mod support;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use imgproc_client::{ClientError, ImageClient, RawDecoder, RetryPolicy};
use support::{color_for, Behavior, FakeServer};

fn short_timeouts(attempt_timeout: Duration) -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        attempt_timeout,
        backoff: Duration::from_millis(10),
    }
}

#[test]
fn batch_request_preserves_order() {
    let server = FakeServer::start();
    let client = ImageClient::connect(server.client_config()).unwrap();

    let paths = ["a.png", "b.png", "c/d.jpg"];
    let images = client.ask_for_images(&paths, 16, 8).unwrap();

    assert_eq!(images.len(), 3);
    for (image, path) in images.iter().zip(paths) {
        assert_eq!(image.dimensions(), (16, 8));
        assert_eq!(image.get_pixel(3, 3), &color_for(path));
    }
}

#[test]
fn gets_command_text_matches_wire_format() {
    let server = FakeServer::start();
    let client = ImageClient::connect(server.client_config()).unwrap();

    let images = client.ask_for_images(&["a.png", "b.png"], 64, 64).unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(
        server.commands(),
        ["setup|image_cache|./|false", "gets|64|64|a.png|b.png"]
    );
}

#[test]
fn single_image_uses_get_command() {
    let server = FakeServer::start();
    let client = ImageClient::connect(server.client_config()).unwrap();

    let image = client.ask_for_image("x.bmp", 4, 2).unwrap();
    assert_eq!(image.dimensions(), (4, 2));
    assert_eq!(image.get_pixel(0, 0), &color_for("x.bmp"));
    assert_eq!(server.commands_of("get")[0].command, "get|x.bmp|4|2");
}

#[test]
fn raw_frames_are_returned_undecoded() {
    let server = FakeServer::start();
    let client =
        ImageClient::connect_with_decoder(server.client_config(), RawDecoder).unwrap();

    let frames = client.ask_for_images(&["a.png"], 2, 2).unwrap();
    assert_eq!(frames[0].as_ref(), support::png_for("a.png", 2, 2).as_slice());
}

#[test]
fn hung_attempts_reconnect_then_succeed() {
    let server = FakeServer::builder()
        .behaviors(&[Behavior::Hang, Behavior::Hang])
        .start();
    let config = server
        .client_config()
        .with_retry(short_timeouts(Duration::from_millis(200)));
    let client = ImageClient::connect(config).unwrap();

    let images = client.ask_for_images(&["a.png", "b.png"], 8, 8).unwrap();
    assert_eq!(images[0].get_pixel(0, 0), &color_for("a.png"));
    assert_eq!(images[1].get_pixel(0, 0), &color_for("b.png"));

    assert_eq!(server.connections(), 3);
    let gets = server.commands_of("gets");
    assert_eq!(
        gets.iter().map(|r| r.connection).collect::<Vec<_>>(),
        [0, 1, 2]
    );
    assert_eq!(server.commands_of("setup").len(), 1);
    assert_eq!(client.current_command(), None);
}

#[test]
fn permanent_hang_exhausts_retries() {
    let server = FakeServer::builder()
        .behaviors(&[Behavior::Hang, Behavior::Hang, Behavior::Hang])
        .start();
    let config = server
        .client_config()
        .with_retry(short_timeouts(Duration::from_millis(150)));
    let client = ImageClient::connect(config).unwrap();

    let started = Instant::now();
    let err = client.ask_for_images(&["a.png"], 8, 8).unwrap_err();

    match err {
        ClientError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(matches!(*last, ClientError::RequestTimedOut(_)));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
    assert!(started.elapsed() >= Duration::from_millis(450));
    assert_eq!(server.commands_of("gets").len(), 3);
    assert_eq!(server.connections(), 3);
    assert_eq!(client.current_command(), None);
}

#[test]
fn broken_channel_mid_request_is_retried() {
    let server = FakeServer::builder()
        .behaviors(&[Behavior::CloseOnRequest])
        .start();
    let client = ImageClient::connect(server.client_config()).unwrap();

    let images = client.ask_for_images(&["a.png"], 8, 8).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(server.connections(), 2);
}

#[test]
fn broken_write_is_retried() {
    let server = FakeServer::builder()
        .behaviors(&[Behavior::CloseAfterSetup])
        .start();
    let client = ImageClient::connect(server.client_config()).unwrap();
    server.wait_for_commands(1);
    thread::sleep(Duration::from_millis(50));

    let images = client.ask_for_images(&["a.png", "b.png"], 8, 8).unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(server.commands_of("gets").len(), 1);
    assert_eq!(server.commands_of("gets")[0].connection, 1);
}

#[test]
fn setup_is_sent_once() {
    let server = FakeServer::builder()
        .behaviors(&[Behavior::Hang])
        .start();
    let config = server
        .client_config()
        .with_working_dir("/data/images")
        .with_retry(short_timeouts(Duration::from_millis(100)));
    let client = ImageClient::connect(config).unwrap();

    client.ask_for_images(&["a.png"], 8, 8).unwrap();
    client.ask_for_images(&["b.png"], 8, 8).unwrap();
    client.clear_cache().unwrap();
    server.wait_for_commands(5);

    let setups = server.commands_of("setup");
    assert_eq!(setups.len(), 1);
    assert_eq!(setups[0].command, "setup|image_cache|/data/images|false");
    assert_eq!(setups[0].connection, 0);
}

#[test]
fn concurrent_requests_are_serialized() {
    let delay = Duration::from_millis(150);
    let server = FakeServer::builder().response_delay(delay).start();
    let client = Arc::new(ImageClient::connect(server.client_config()).unwrap());

    let started = Instant::now();
    let workers: Vec<_> = ["left.png", "right.png"]
        .into_iter()
        .map(|path| {
            let client = Arc::clone(&client);
            thread::spawn(move || (path, client.ask_for_images(&[path], 4, 4).unwrap()))
        })
        .collect();

    for worker in workers {
        let (path, images) = worker.join().unwrap();
        assert_eq!(images[0].get_pixel(0, 0), &color_for(path));
    }
    assert!(started.elapsed() >= delay * 2);

    let gets = server.commands_of("gets");
    assert_eq!(gets.len(), 2);
    assert!(gets[1].at.duration_since(gets[0].at) >= delay);
    assert_eq!(server.connections(), 1);
}

#[test]
fn connect_waits_for_channel_to_appear() {
    let server = FakeServer::builder()
        .bind_after(Duration::from_millis(300))
        .start();
    let config = server
        .client_config()
        .with_connect_retry_interval(Duration::from_millis(50));

    let started = Instant::now();
    let client = ImageClient::connect(config).unwrap();
    assert!(started.elapsed() >= Duration::from_millis(250));

    assert_eq!(client.ask_for_images(&["a.png"], 2, 2).unwrap().len(), 1);
    assert_eq!(server.connections(), 1);
}

#[test]
fn connect_timeout_surfaces_when_channel_never_appears() {
    let server = FakeServer::builder()
        .bind_after(Duration::from_secs(30))
        .start();
    let config = server
        .client_config()
        .with_connect_timeout(Some(Duration::from_millis(100)));

    let err = ImageClient::connect(config).unwrap_err();
    assert!(matches!(err, ClientError::ConnectTimeout { .. }));
}

#[test]
fn invalid_paths_are_rejected_before_sending() {
    let server = FakeServer::start();
    let client = ImageClient::connect(server.client_config()).unwrap();
    server.wait_for_commands(1);

    let err = client.ask_for_images(&["a|b.png"], 8, 8).unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)));
    let err = client.ask_for_image("", 8, 8).unwrap_err();
    assert!(matches!(err, ClientError::InvalidArgument(_)));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(server.commands(), ["setup|image_cache|./|false"]);
}

#[test]
fn empty_batch_returns_nothing_without_a_request() {
    let server = FakeServer::start();
    let client = ImageClient::connect(server.client_config()).unwrap();
    server.wait_for_commands(1);

    let empty: [&str; 0] = [];
    assert!(client.ask_for_images(&empty, 8, 8).unwrap().is_empty());
    assert!(client.ask_for_image_bytes(&empty, 8, 8).unwrap().is_empty());
    assert_eq!(client.current_command(), None);

    // The channel is still usable and nothing was sent for the empty batch.
    assert_eq!(client.ask_for_images(&["a.png"], 2, 2).unwrap().len(), 1);
    assert_eq!(
        server.commands(),
        ["setup|image_cache|./|false", "gets|2|2|a.png"]
    );
}

#[test]
fn undecodable_frame_is_not_retried() {
    let server = FakeServer::start();
    let client =
        ImageClient::connect_with_decoder(server.client_config(), FailingDecoder).unwrap();

    let err = client.ask_for_images(&["a.png"], 2, 2).unwrap_err();
    assert!(matches!(err, ClientError::Decode { index: 0, .. }));
    assert_eq!(server.commands_of("gets").len(), 1);
    assert_eq!(server.connections(), 1);
}

#[derive(Debug)]
struct FailingDecoder;

impl imgproc_client::ImageDecoder for FailingDecoder {
    type Image = ();

    fn decode(&self, _payload: bytes::Bytes) -> Result<(), imgproc_client::DecodeError> {
        Err(imgproc_client::DecodeError::Empty)
    }
}

#[test]
fn restarted_server_gets_setup_again() {
    let server = FakeServer::start();
    let config = server.client_config().with_server(
        imgproc_client::ServerConfig::new("/bin/sh")
            .with_args(["-c", "sleep 0.3"])
            .with_max_restarts(1),
    );
    let client = ImageClient::connect(config).unwrap();
    let first_pid = client.commands().server_pid().unwrap();

    thread::sleep(Duration::from_millis(800));
    client.commands().reconnect().unwrap();

    let setups = server.wait_for_commands(2);
    assert_eq!(setups.iter().filter(|r| r.command.starts_with("setup")).count(), 2);
    assert_ne!(client.commands().server_pid().unwrap(), first_pid);
}
