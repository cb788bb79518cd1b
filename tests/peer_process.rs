// Fleets of real `ov_peer` processes

use std::net::TcpListener;
use std::path::PathBuf;
use std::time::Duration;

use ov_share::{fetch, Address, FleetDescriptor, Launcher, Request, RoutingMode};
use tempfile::TempDir;
use tokio::process::Command;

const PEER_BINARY: &str = env!("CARGO_BIN_EXE_ov_peer");

/// First port of `count` consecutive free ports on localhost
fn free_port_range(count: u16) -> u16 {
    loop {
        let socket = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = socket.local_addr().unwrap().port();
        drop(socket);
        if base.checked_add(count).is_none() {
            continue;
        }
        if (base..base + count).all(|port| TcpListener::bind(("127.0.0.1", port)).is_ok()) {
            return base;
        }
    }
}

fn process_launcher() -> Launcher {
    Launcher::Process {
        binary: Some(PathBuf::from(PEER_BINARY)),
    }
}

/// Query until the peer process is up and returns content
async fn fetch_when_ready(address: &Address, filename: &str) -> Vec<u8> {
    let request = Request::new(filename).unwrap();
    for _ in 0..100 {
        if let Ok(response) = fetch(address, &request, Some(Duration::from_secs(2))).await {
            if !response.is_empty() {
                return response;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{} never served {}", address, filename);
}

#[tokio::test]
async fn test_random_walk_processes_serve_and_stop() {
    let temp = TempDir::new().unwrap();
    let mut fleet = FleetDescriptor::new(
        "127.0.0.1",
        free_port_range(3),
        3,
        temp.path(),
        RoutingMode::RandomWalk,
    );
    // passed as the optional last argument
    fleet.hop_limit = Some(2);
    fleet.provision_shared_folders(2).unwrap();

    let running = process_launcher().launch(&fleet).await.unwrap();
    assert_eq!(running.len(), 3);

    for (index, address) in fleet.addresses().iter().enumerate() {
        let response = fetch_when_ready(address, "file2.txt").await;
        let expected = std::fs::read(fleet.shared_folder(index).join("file2.txt")).unwrap();
        assert_eq!(response, expected);
    }

    running.stop().await;
    for address in fleet.addresses() {
        assert!(tokio::net::TcpStream::connect(address.connect_string())
            .await
            .is_err());
    }
}

#[tokio::test]
async fn test_fetch_subcommand_downloads_from_friend_first_fleet() {
    let temp = TempDir::new().unwrap();
    let fleet = FleetDescriptor::new(
        "127.0.0.1",
        free_port_range(2),
        2,
        temp.path().join("fleet"),
        RoutingMode::FriendFirst,
    );
    fleet.provision_shared_folders(1).unwrap();
    let running = process_launcher().launch(&fleet).await.unwrap();
    let addresses = fleet.addresses();
    fetch_when_ready(&addresses[1], "file1.txt").await;

    let client = temp.path().join("Client");
    let status = Command::new(PEER_BINARY)
        .arg("fetch")
        .arg(&client)
        .arg(format!("[[\"127.0.0.1\", {}]]", addresses[1].port))
        .arg(format!(
            "[[\"127.0.0.1\", {}], [\"127.0.0.1\", {}]]",
            addresses[0].port, addresses[1].port
        ))
        .arg("file1.txt")
        .status()
        .await
        .unwrap();
    running.stop().await;

    assert!(status.success());
    assert_eq!(
        std::fs::read(client.join("downloaded_file1.txt")).unwrap(),
        std::fs::read(fleet.shared_folder(1).join("file1.txt")).unwrap()
    );
}

#[tokio::test]
async fn test_fetch_subcommand_exits_2_when_exhausted() {
    let temp = TempDir::new().unwrap();
    let dead = free_port_range(1);

    let status = Command::new(PEER_BINARY)
        .arg("fetch")
        .arg(temp.path())
        .arg("[]")
        .arg(format!("[[\"127.0.0.1\", {}]]", dead))
        .arg("file1.txt")
        .status()
        .await
        .unwrap();

    assert_eq!(status.code(), Some(2));
    assert!(!temp.path().join("downloaded_file1.txt").exists());
}

#[tokio::test]
async fn test_bad_arguments_exit_1() {
    let status = Command::new(PEER_BINARY)
        .args(["random-walk", "Peer1", "127.0.0.1", "not-a-port", "/tmp", "[]"])
        .status()
        .await
        .unwrap();
    assert_eq!(status.code(), Some(1));
}
