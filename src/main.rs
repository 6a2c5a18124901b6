mod cli;

use actix_web::{App, HttpServer};
use docdb::Database;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> Result<(), std::io::Error> {
    init_tracing();

    let args: Vec<String> = std::env::args().collect();

    if args.len() >= 2 && args[1] == "serve" {
        let bind = args.get(2).cloned().unwrap_or_else(|| "0.0.0.0:7878".to_string());
        actix_web::rt::System::new().block_on(async move {
            HttpServer::new(|| App::new().configure(docdb::server::config))
                .bind(bind.as_str())?
                .run()
                .await
        })
    } else if args.len() == 2 {
        match Database::open(&args[1]) {
            Ok(db) => cli::run_repl(&db),
            Err(e) => {
                eprintln!("Error opening '{}': {}", args[1], e);
                std::process::exit(1);
            }
        }
        Ok(())
    } else if args.len() > 2 {
        cli::run_single_command();
        Ok(())
    } else {
        eprintln!("Usage: docdb <db_dir> [command [args...]] | docdb serve [addr]");
        std::process::exit(1);
    }
}
