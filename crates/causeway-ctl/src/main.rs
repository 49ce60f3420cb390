//! causeway-ctl — command-line peer for the Causeway gateway.
//!
//! Speaks the gateway's own binary peer protocol over HTTP, one exchange per
//! command: connect opens a relay session and prints its id; send, recv, and
//! close operate on an existing session.

mod cmd;

use anyhow::Result;

const DEFAULT_PORT: u16 = 22080;

fn usage() -> ! {
    eprintln!("usage: causeway-ctl [--port <port>] <command>");
    eprintln!();
    eprintln!("commands:");
    eprintln!("  status                      gateway status and live sessions");
    eprintln!("  connect <device-id>         open a relay session to a device");
    eprintln!("  send <session-id> <text>    forward text to the session's peer");
    eprintln!("  recv <session-id>           poll the session for inbound data");
    eprintln!("  close <session-id>          tear the session down");
    std::process::exit(2);
}

fn arg<'a>(args: &'a [String], index: usize, what: &str) -> &'a str {
    match args.get(index) {
        Some(value) => value,
        None => {
            eprintln!("missing argument: {what}");
            usage()
        }
    }
}

/// Pull an optional `--port <n>` pair out of the argument list.
fn take_port_flag(args: &mut Vec<String>) -> Result<Option<u16>> {
    let Some(position) = args.iter().position(|a| a == "--port") else {
        return Ok(None);
    };
    if position + 1 >= args.len() {
        eprintln!("--port requires a value");
        usage()
    }
    let value = args.remove(position + 1);
    args.remove(position);
    Ok(Some(value.parse()?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let port = take_port_flag(&mut args)?.unwrap_or(DEFAULT_PORT);

    let Some(command) = args.first().cloned() else {
        usage()
    };

    match command.as_str() {
        "status" => cmd::status::run(port).await,
        "connect" => cmd::session::connect(port, arg(&args, 1, "device id")).await,
        "send" => {
            cmd::session::send(port, arg(&args, 1, "session id"), arg(&args, 2, "text")).await
        }
        "recv" => cmd::session::recv(port, arg(&args, 1, "session id")).await,
        "close" => cmd::session::close(port, arg(&args, 1, "session id")).await,
        _ => usage(),
    }
}
