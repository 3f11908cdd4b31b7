//! # httpserver
//!
//! Multithreaded GET/PUT file server for the current working directory.
//!
//! ## Usage
//!
//!     httpserver [-t threads] <port>
//!
//! Writes one audit line per request to stderr:
//!
//!     GET,/hello.txt,200,1
//!
//! Set `LOCKSERVE_LOG_LEVEL=info` (or `debug`, `trace`) for diagnostics.

use std::process::ExitCode;

use lockserve_core::kprint;
use lockserve_server::{Server, ServerConfig, ServerError};

#[derive(Debug, PartialEq, Eq)]
struct Args {
    threads: usize,
    port: u16,
}

#[derive(Debug, PartialEq, Eq)]
enum ArgsError {
    Usage,
    InvalidPort,
}

fn parse_args<I, S>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut threads = lockserve_server::config::defaults::NUM_WORKERS;
    let mut port = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        let arg = arg.as_ref();
        let count = if arg == "-t" {
            let next = args.next().ok_or(ArgsError::Usage)?;
            next.as_ref().parse::<usize>().map_err(|_| ArgsError::Usage)?
        } else if let Some(rest) = arg.strip_prefix("-t") {
            rest.parse::<usize>().map_err(|_| ArgsError::Usage)?
        } else if arg.starts_with('-') || port.is_some() {
            return Err(ArgsError::Usage);
        } else {
            port = Some(parse_port(arg)?);
            continue;
        };
        if count == 0 {
            return Err(ArgsError::Usage);
        }
        threads = count;
    }

    Ok(Args {
        threads,
        port: port.ok_or(ArgsError::Usage)?,
    })
}

fn parse_port(s: &str) -> Result<u16, ArgsError> {
    match s.parse::<u16>() {
        Ok(p) if p >= 1 => Ok(p),
        _ => Err(ArgsError::InvalidPort),
    }
}

/// Configuration comes from the command line alone
fn server_config(args: &Args) -> ServerConfig {
    ServerConfig::new().port(args.port).num_workers(args.threads)
}

fn main() -> ExitCode {
    kprint::init();

    let argv: Vec<String> = std::env::args().collect();
    let prog = argv.first().map(String::as_str).unwrap_or("httpserver");

    let args = match parse_args(argv.iter().skip(1)) {
        Ok(args) => args,
        Err(ArgsError::InvalidPort) => {
            eprintln!("Invalid Port");
            return ExitCode::FAILURE;
        }
        Err(ArgsError::Usage) => {
            eprintln!("usage: {} [-t threads] <port>", prog);
            return ExitCode::FAILURE;
        }
    };

    let server = match Server::bind(server_config(&args)) {
        Ok(server) => server,
        Err(ServerError::Bind { source, .. }) => {
            lockserve_core::kdebug!("bind failed: {}", source);
            eprintln!("Invalid Port");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            lockserve_core::kerror!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    server.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_only() {
        assert_eq!(parse_args(["8080"]), Ok(Args { threads: 4, port: 8080 }));
    }

    #[test]
    fn test_thread_flag_forms() {
        assert_eq!(parse_args(["-t", "8", "80"]), Ok(Args { threads: 8, port: 80 }));
        assert_eq!(parse_args(["-t2", "80"]), Ok(Args { threads: 2, port: 80 }));
        assert_eq!(parse_args(["80", "-t", "3"]), Ok(Args { threads: 3, port: 80 }));
    }

    #[test]
    fn test_usage_errors() {
        assert_eq!(parse_args(Vec::<String>::new()), Err(ArgsError::Usage));
        assert_eq!(parse_args(["-t", "0", "80"]), Err(ArgsError::Usage));
        assert_eq!(parse_args(["-t", "x", "80"]), Err(ArgsError::Usage));
        assert_eq!(parse_args(["-t"]), Err(ArgsError::Usage));
        assert_eq!(parse_args(["-x", "80"]), Err(ArgsError::Usage));
        assert_eq!(parse_args(["80", "81"]), Err(ArgsError::Usage));
    }

    #[test]
    fn test_config_ignores_environment() {
        std::env::set_var("LOCKSERVE_FAIRNESS", "7");
        std::env::set_var("LOCKSERVE_QUEUE_CAPACITY", "1");
        let config = server_config(&Args { threads: 4, port: 8080 });
        std::env::remove_var("LOCKSERVE_FAIRNESS");
        std::env::remove_var("LOCKSERVE_QUEUE_CAPACITY");

        assert_eq!(config.port, 8080);
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.fairness, 1);
        assert_eq!(config.effective_queue_capacity(), 4);
    }

    #[test]
    fn test_invalid_port() {
        assert_eq!(parse_args(["0"]), Err(ArgsError::InvalidPort));
        assert_eq!(parse_args(["65536"]), Err(ArgsError::InvalidPort));
        assert_eq!(parse_args(["80a"]), Err(ArgsError::InvalidPort));
    }
}
