use anyhow::{Context as _, Result};
use knownhosts::{normalize, parse_key_line, split_host_port, HostKeyDb, HostKeyOutcome};
use std::{env, net::SocketAddr, path::PathBuf};

const USAGE: &str = "usage: lookup <host[:port]> [--add '<type> <base64>'] [known_hosts...]";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = env::args().skip(1);
    let host = args.next().context(USAGE)?;

    let mut add = None;
    let mut files = vec![];
    while let Some(arg) = args.next() {
        if arg == "--add" {
            add = Some(args.next().context(USAGE)?);
        } else {
            files.push(PathBuf::from(arg));
        }
    }
    if files.is_empty() {
        let home = env::var_os("HOME").context("HOME is not set")?;
        files.push(PathBuf::from(home).join(".ssh").join("known_hosts"));
    }

    tracing::debug!("load known_hosts (files = {:?})", files);
    let db = HostKeyDb::new(&files)?;

    let host_with_port = match split_host_port(&host) {
        Ok(..) => host.clone(),
        Err(..) if host.contains(':') => {
            format!("[{}]:22", host.trim_start_matches('[').trim_end_matches(']'))
        }
        Err(..) => format!("{}:22", host),
    };

    println!("host: {}", normalize(&host_with_port));
    for key in db.host_keys(&host_with_port)? {
        println!(
            "  {}:{}: {}{}",
            key.filename,
            key.line,
            if key.cert_authority { "@cert-authority " } else { "" },
            key.key.key_type()
        );
    }
    println!(
        "algorithms: {}",
        db.host_key_algorithms(&host_with_port)?.join(",")
    );

    let key_line = match add {
        Some(key_line) => key_line,
        None => return Ok(()),
    };
    let key = parse_key_line(&key_line)?;

    let remote = tokio::net::lookup_host(&host_with_port)
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 0)));
    tracing::debug!("resolved {} to {}", host_with_port, remote);

    match db.verify(&host_with_port, remote, &*key)? {
        HostKeyOutcome::Trusted => println!("key is trusted"),
        HostKeyOutcome::KeyChanged { .. } | HostKeyOutcome::HostUnknown => {
            let callback = db.accept_new_callback(&files[0]);
            callback(host_with_port.as_str(), remote, &*key)?;
            println!("added key to {}", files[0].display());
        }
    }

    Ok(())
}
