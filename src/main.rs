// Peer process
//
// Usage:
//   ov_peer random-walk  <peer_id> <host> <port> <shared_folder> <known_peers> [hop_limit]
//   ov_peer friend-first <peer_id> <host> <port> <shared_folder> <friend_peers> <known_peers>
//   ov_peer fetch <shared_folder> <friend_peers> <known_peers> <filename>
//
// Peer lists look like [["127.0.0.1", 5001], ["127.0.0.1", 5002]].
// A peer runs until the process is terminated.

use std::env;
use std::path::PathBuf;
use std::process;

use log::{error, info, LevelFilter};
use simple_logger::SimpleLogger;

use ov_share::{
    parse_addresses, Address, FriendDirectory, FriendWalk, PeerConfig, PeerError, PeerNode,
    RandomWalkDirectory, RoutingMode, RoutingStrategy,
};

fn usage(program: &str) -> ! {
    eprintln!(
        "Usage: {} random-walk <peer_id> <host> <port> <shared_folder> <known_peers> [hop_limit]",
        program
    );
    eprintln!(
        "       {} friend-first <peer_id> <host> <port> <shared_folder> <friend_peers> <known_peers>",
        program
    );
    eprintln!(
        "       {} fetch <shared_folder> <friend_peers> <known_peers> <filename>",
        program
    );
    process::exit(1);
}

#[tokio::main]
async fn main() {
    if let Err(e) = SimpleLogger::new().with_level(LevelFilter::Info).init() {
        eprintln!("failed to initialise logging: {}", e);
    }

    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("ov_peer");
    if args.len() < 2 {
        usage(program);
    }

    let result = match args[1].as_str() {
        "fetch" => fetch(&args[2..]).await,
        mode => match RoutingMode::from_arg(mode) {
            Some(mode) => serve(mode, &args[2..]).await,
            None => usage(program),
        },
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

/// Exit code of `fetch` when no peer returned the file
const EXIT_NOT_FOUND: i32 = 2;

async fn serve(mode: RoutingMode, args: &[String]) -> Result<(), PeerError> {
    let (config, strategy) = parse_serve_args(mode, args)?;
    let node = PeerNode::new(config, strategy)?;
    info!("{} starting as {}", node.peer_id(), mode.as_arg());
    node.listen().await?.run().await;
    Ok(())
}

/// `<peer_id> <host> <port> <shared_folder>` followed by
/// `<known_peers> [hop_limit]` or `<friend_peers> <known_peers>`
fn parse_serve_args(
    mode: RoutingMode,
    args: &[String],
) -> Result<(PeerConfig, RoutingStrategy), PeerError> {
    let expected = match mode {
        RoutingMode::RandomWalk => 5..=6,
        RoutingMode::FriendFirst => 6..=6,
    };
    if !expected.contains(&args.len()) {
        return Err(PeerError::Arguments(format!(
            "{} expects {} to {} arguments, got {}",
            mode.as_arg(),
            expected.start(),
            expected.end(),
            args.len()
        )));
    }

    let port: u16 = args[2]
        .parse()
        .map_err(|_| PeerError::Arguments(format!("invalid port {:?}", args[2])))?;
    let own = Address::new(args[1].clone(), port);
    let config = PeerConfig::new(args[0].clone(), own.clone(), PathBuf::from(&args[3]));

    let strategy = match mode {
        RoutingMode::RandomWalk => {
            let hop_limit = match args.get(5) {
                Some(raw) => Some(raw.parse::<u32>().map_err(|_| {
                    PeerError::Arguments(format!("invalid hop limit {:?}", raw))
                })?),
                None => None,
            };
            RoutingStrategy::RandomWalk {
                directory: RandomWalkDirectory::new(&own, parse_addresses(&args[4])?),
                hop_limit,
            }
        }
        RoutingMode::FriendFirst => RoutingStrategy::friend_first(FriendDirectory::new(
            &own,
            parse_addresses(&args[4])?,
            parse_addresses(&args[5])?,
        )),
    };

    Ok((config, strategy))
}

async fn fetch(args: &[String]) -> Result<(), PeerError> {
    let (folder, directory, filename) = parse_fetch_args(args)?;
    std::fs::create_dir_all(&folder)?;

    match FriendWalk::new(directory, &folder).request_file(&filename).await {
        Ok(outcome) => {
            info!(
                "{} ({} bytes) from {} after {} attempts -> {}",
                filename,
                outcome.bytes,
                outcome.source,
                outcome.attempted,
                outcome.artifact.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            process::exit(EXIT_NOT_FOUND);
        }
    }
}

/// `<shared_folder> <friend_peers> <known_peers> <filename>`
fn parse_fetch_args(args: &[String]) -> Result<(PathBuf, FriendDirectory, String), PeerError> {
    if args.len() != 4 {
        return Err(PeerError::Arguments(format!(
            "fetch expects 4 arguments, got {}",
            args.len()
        )));
    }

    // the fetching client is not a listening peer, nothing to exclude
    let own = Address::new("", 0);
    let directory = FriendDirectory::new(
        &own,
        parse_addresses(&args[1])?,
        parse_addresses(&args[2])?,
    );
    Ok((PathBuf::from(&args[0]), directory, args[3].clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    const FLEET: &str = r#"[["127.0.0.1", 5000], ["127.0.0.1", 5001], ["127.0.0.1", 5002]]"#;

    #[test]
    fn test_random_walk_arguments() {
        let (config, strategy) = parse_serve_args(
            RoutingMode::RandomWalk,
            &args(&["Peer2", "127.0.0.1", "5001", "/tmp/Peer2", FLEET]),
        )
        .unwrap();
        assert_eq!(config.peer_id, "Peer2");
        assert_eq!(config.address, Address::new("127.0.0.1", 5001));
        assert_eq!(config.shared_folder, PathBuf::from("/tmp/Peer2"));
        match strategy {
            RoutingStrategy::RandomWalk {
                directory,
                hop_limit,
            } => {
                let ports: Vec<u16> = directory.neighbors().iter().map(|a| a.port).collect();
                assert_eq!(ports, vec![5000, 5002]);
                assert_eq!(hop_limit, None);
            }
            other => panic!("unexpected strategy {:?}", other),
        }
    }

    #[test]
    fn test_optional_hop_limit() {
        let (_, strategy) = parse_serve_args(
            RoutingMode::RandomWalk,
            &args(&["Peer1", "127.0.0.1", "5000", "/tmp/Peer1", FLEET, "3"]),
        )
        .unwrap();
        assert!(matches!(
            strategy,
            RoutingStrategy::RandomWalk {
                hop_limit: Some(3),
                ..
            }
        ));

        let result = parse_serve_args(
            RoutingMode::RandomWalk,
            &args(&["Peer1", "127.0.0.1", "5000", "/tmp/Peer1", FLEET, "-1"]),
        );
        assert!(matches!(result, Err(PeerError::Arguments(_))));
    }

    #[test]
    fn test_friend_first_arguments() {
        let (_, strategy) = parse_serve_args(
            RoutingMode::FriendFirst,
            &args(&[
                "Peer1",
                "127.0.0.1",
                "5000",
                "/tmp/Peer1",
                r#"[["127.0.0.1", 5001]]"#,
                FLEET,
            ]),
        )
        .unwrap();
        match strategy {
            RoutingStrategy::FriendFirst { directory } => {
                assert_eq!(directory.friends(), &[Address::new("127.0.0.1", 5001)]);
                assert_eq!(directory.known().len(), 2);
            }
            other => panic!("unexpected strategy {:?}", other),
        }
    }

    #[test]
    fn test_rejects_bad_arguments() {
        // bad port
        let result = parse_serve_args(
            RoutingMode::RandomWalk,
            &args(&["Peer1", "127.0.0.1", "50x0", "/tmp/Peer1", FLEET]),
        );
        assert!(matches!(result, Err(PeerError::Arguments(_))));

        // wrong arity
        for (mode, count) in [
            (RoutingMode::RandomWalk, 4),
            (RoutingMode::RandomWalk, 7),
            (RoutingMode::FriendFirst, 5),
            (RoutingMode::FriendFirst, 7),
        ] {
            let result = parse_serve_args(mode, &vec!["x".to_string(); count]);
            assert!(matches!(result, Err(PeerError::Arguments(_))), "{:?} {}", mode, count);
        }

        // unparsable directory
        let result = parse_serve_args(
            RoutingMode::RandomWalk,
            &args(&["Peer1", "127.0.0.1", "5000", "/tmp/Peer1", "[[\"host\"]]"]),
        );
        assert!(matches!(result, Err(PeerError::Directory(_))));
    }

    #[test]
    fn test_fetch_arguments() {
        let (folder, directory, filename) = parse_fetch_args(&args(&[
            "/tmp/Client",
            r#"[["127.0.0.1", 5001]]"#,
            FLEET,
            "file1.txt",
        ]))
        .unwrap();
        assert_eq!(folder, PathBuf::from("/tmp/Client"));
        assert_eq!(filename, "file1.txt");
        assert_eq!(directory.friends().len(), 1);
        assert_eq!(directory.known().len(), 3);

        assert!(matches!(
            parse_fetch_args(&args(&["/tmp/Client", "[]", "[]"])),
            Err(PeerError::Arguments(_))
        ));
    }
}
