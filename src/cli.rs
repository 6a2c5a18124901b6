use std::env;
use std::io::{self, Write};
use docdb::{Database, DbError, Engine, Row, Value};
use docdb::fetch::fetch_document;
use docdb::table::ENCODED_COLUMN;

/// Columns of the table that insert-url / insert-file write into when it
/// does not exist yet.
const DOCUMENT_COLUMNS: &[&str] = &["url", "content"];

pub enum Command {
    CreateTable { name: String, columns: Vec<String>, primary_key: Option<String> },
    Insert { table: String, values: Vec<(String, String)> },
    InsertUrl { table: String, url: String },
    InsertFile { table: String, path: String },
    Nearest { text: String },
    Search { text: String, top: usize },
    Tables,
    Rows { table: String },
}

/// Parse a command from a provided argument vector
/// This is used both for command-line args and REPL input
pub fn parse_command_from_args(args: &[String]) -> Result<Command, String> {
    if args.len() < 2 {
        return Err("No command provided. Use: create-table, insert, insert-url, insert-file, nearest, search, tables, rows".to_string());
    }

    let command = &args[1];

    match command.as_str() {
        "create-table" => parse_create_table(args),
        "insert" => parse_insert(args),
        "insert-url" => parse_insert_url(args),
        "insert-file" => parse_insert_file(args),
        "nearest" => parse_nearest(args),
        "search" => parse_search(args),
        "tables" => parse_tables(args),
        "rows" => parse_rows(args),
        _ => Err(format!("Unknown command: {}. Available: create-table, insert, insert-url, insert-file, nearest, search, tables, rows", command)),
    }
}

/// Parse the 'create-table' command
/// Usage: docdb <dir> create-table <name> <column> ... [--pk <column>]
fn parse_create_table(args: &[String]) -> Result<Command, String> {
    if args.len() < 4 {
        return Err("'create-table' requires a name and at least one column. Usage: create-table <name> <column> ... [--pk <column>]".to_string());
    }

    let name = args[2].clone();
    let mut columns: Vec<String> = Vec::new();
    let mut primary_key = None;

    let mut rest = args[3..].iter();
    while let Some(arg) = rest.next() {
        if arg == "--pk" {
            match rest.next() {
                Some(pk) => primary_key = Some(pk.clone()),
                None => return Err("'--pk' requires a column name".to_string()),
            }
        } else {
            columns.push(arg.clone());
        }
    }

    if columns.is_empty() {
        return Err("'create-table' requires at least one column".to_string());
    }

    Ok(Command::CreateTable { name, columns, primary_key })
}

/// Parse the 'insert' command
/// Usage: docdb <dir> insert <table> <column=value> ...
fn parse_insert(args: &[String]) -> Result<Command, String> {
    if args.len() < 4 {
        return Err("'insert' requires a table and column=value pairs. Usage: insert <table> <column=value> ...".to_string());
    }

    let table = args[2].clone();
    let mut values = Vec::new();

    for pair in &args[3..] {
        match pair.split_once('=') {
            Some((column, value)) if !column.is_empty() => {
                values.push((column.to_string(), value.to_string()));
            }
            _ => return Err(format!("Invalid pair '{}', expected column=value", pair)),
        }
    }

    Ok(Command::Insert { table, values })
}

/// Parse the 'insert-url' command
/// Usage: docdb <dir> insert-url <table> <url>
fn parse_insert_url(args: &[String]) -> Result<Command, String> {
    if args.len() < 4 {
        return Err("'insert-url' requires a table and a url. Usage: insert-url <table> <url>".to_string());
    }

    Ok(Command::InsertUrl { table: args[2].clone(), url: args[3].clone() })
}

/// Parse the 'insert-file' command
/// Usage: docdb <dir> insert-file <table> <path>
fn parse_insert_file(args: &[String]) -> Result<Command, String> {
    if args.len() < 4 {
        return Err("'insert-file' requires a table and a file path. Usage: insert-file <table> <path>".to_string());
    }

    Ok(Command::InsertFile { table: args[2].clone(), path: args[3].clone() })
}

/// Parse the 'nearest' command
/// Usage: docdb <dir> nearest <text> ...
fn parse_nearest(args: &[String]) -> Result<Command, String> {
    if args.len() < 3 {
        return Err("'nearest' requires query text. Usage: nearest <text> ...".to_string());
    }

    Ok(Command::Nearest { text: args[2..].join(" ") })
}

/// Parse the 'search' command
/// Usage: docdb <dir> search <text> ... [--top <number>]
fn parse_search(args: &[String]) -> Result<Command, String> {
    if args.len() < 3 {
        return Err("'search' requires query text. Usage: search <text> ... [--top <number>]".to_string());
    }

    let mut top = 5; // default value
    let mut text_end = args.len();

    // Check if last two args are --top and a number
    if args.len() >= 5 && args[args.len() - 2] == "--top" {
        match args[args.len() - 1].parse::<usize>() {
            Ok(n) => {
                top = n;
                text_end = args.len() - 2;
            }
            Err(_) => {
                return Err(format!("Invalid --top value: '{}'. Must be a positive integer.", args[args.len() - 1]));
            }
        }
    }

    let text = args[2..text_end].join(" ");
    if text.is_empty() {
        return Err("Search text cannot be empty".to_string());
    }

    Ok(Command::Search { text, top })
}

/// Parse the 'tables' command
/// Usage: docdb <dir> tables
fn parse_tables(args: &[String]) -> Result<Command, String> {
    if args.len() > 2 {
        eprintln!("Warning: 'tables' command takes no arguments, ignoring extras");
    }

    Ok(Command::Tables)
}

/// Parse the 'rows' command
/// Usage: docdb <dir> rows <table>
fn parse_rows(args: &[String]) -> Result<Command, String> {
    if args.len() < 3 {
        return Err("'rows' requires a table name. Usage: rows <table>".to_string());
    }

    Ok(Command::Rows { table: args[2].clone() })
}

/// REPL mode - interactive session against one store directory
pub fn run_repl(db: &Database) {
    println!("docdb - Document Store ({})", db.db_dir().display());
    println!("Type 'help' for commands, 'exit' or 'quit' to quit\n");

    loop {
        print!("docdb> ");
        io::stdout().flush().unwrap();

        let mut input = String::new();
        match io::stdin().read_line(&mut input) {
            Ok(_) => {}
            Err(error) => {
                eprintln!("Error reading input: {}", error);
                continue;
            }
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input == "exit" || input == "quit" {
            println!("Goodbye!");
            break;
        }

        if input == "help" {
            print_help();
            continue;
        }

        let mut args: Vec<String> = vec!["docdb".to_string()];
        args.extend(input.split_whitespace().map(|s| s.to_string()));

        let command = match parse_command_from_args(&args) {
            Ok(cmd) => cmd,
            Err(error) => {
                eprintln!("Error: {}", error);
                continue;
            }
        };

        execute_command(db, command);
    }
}

/// Single-command mode - open the store, execute one command, exit
/// Usage: docdb <db_dir> <command> [args...]
pub fn run_single_command() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: docdb <db_dir> <command> [args...]");
        std::process::exit(1);
    }

    let db = match Database::open(&args[1]) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Error opening '{}': {}", args[1], e);
            std::process::exit(1);
        }
    };

    // Rebuild args: shift so args[1] becomes the command
    let shifted_args: Vec<String> = std::iter::once(args[0].clone())
        .chain(args[2..].iter().cloned())
        .collect();

    let command = match parse_command_from_args(&shifted_args) {
        Ok(cmd) => cmd,
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(1);
        }
    };

    execute_command(&db, command);
}

/// Values typed on the command line: integers become Int, everything else
/// stays Text.
fn parse_value(raw: &str) -> Value {
    match raw.parse::<i64>() {
        Ok(n) => Value::Int(n),
        Err(_) => Value::Text(raw.to_string()),
    }
}

fn insert_document(db: &Database, table: &str, url: &str, content: String) {
    if !db.table_names().iter().any(|name| name == table) {
        let columns: Vec<String> = DOCUMENT_COLUMNS.iter().map(|s| s.to_string()).collect();
        match db.create_table(table, &columns, None) {
            Ok(()) => println!("Created table '{}'", table),
            Err(e) => {
                eprintln!("Error: {}", e);
                return;
            }
        }
    }

    let mut row = Row::new();
    row.insert("url".to_string(), Value::Text(url.to_string()));
    row.insert("content".to_string(), Value::Text(content));

    match db.insert(table, row) {
        Ok(key) => println!("Inserted into '{}' with key {}", table, key),
        Err(e) => eprintln!("Error: {}", e),
    }
}

fn print_matches(db: &Database, matches: &[docdb::Match]) {
    for (rank, m) in matches.iter().enumerate() {
        let text = match m.row.get(ENCODED_COLUMN) {
            Some(Value::Tokens(ids)) => db.decode(ids),
            _ => String::new(),
        };
        println!("{}. [{}] Score: {:.4}", rank + 1, m.table, m.score);
        println!("   {}", text);
    }
}

fn execute_command(db: &Database, command: Command) {
    match command {
        Command::CreateTable { name, columns, primary_key } => {
            match db.create_table(&name, &columns, primary_key.as_deref()) {
                Ok(()) => println!("Created table '{}'", name),
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Command::Insert { table, values } => {
            let mut row = Row::new();
            for (column, raw) in values {
                row.insert(column, parse_value(&raw));
            }
            match db.insert(&table, row) {
                Ok(key) => println!("Inserted into '{}' with key {}", table, key),
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Command::InsertUrl { table, url } => {
            // A failed fetch means "no content to insert", nothing more
            match fetch_document(&url) {
                Ok(content) => insert_document(db, &table, &url, content),
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Command::InsertFile { table, path } => {
            match std::fs::read_to_string(&path) {
                Ok(content) => insert_document(db, &table, &path, content),
                Err(e) => eprintln!("Error reading '{}': {}", path, e),
            }
        }

        Command::Nearest { text } => {
            let engine = Engine::new(db);
            match engine.find_nearest(&text, 1) {
                Ok(matches) if matches.is_empty() => println!("No match found"),
                Ok(matches) => print_matches(db, &matches),
                Err(DbError::Loading(_)) => println!("No match found"),
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Command::Search { text, top } => {
            let engine = Engine::new(db);
            match engine.find_nearest(&text, top) {
                Ok(matches) if matches.is_empty() => println!("No match found"),
                Ok(matches) => {
                    println!("Top {} results:", matches.len());
                    print_matches(db, &matches);
                }
                Err(DbError::Loading(_)) => println!("No match found"),
                Err(e) => eprintln!("Error: {}", e),
            }
        }

        Command::Tables => {
            let names = db.table_names();
            if names.is_empty() {
                println!("Store is empty");
            } else {
                for name in names {
                    println!("{}", name);
                }
            }
        }

        Command::Rows { table } => {
            match db.table_rows(&table) {
                Ok(rows) if rows.is_empty() => println!("Table '{}' is empty", table),
                Ok(rows) => {
                    for row in &rows {
                        let rendered: Vec<String> = row.iter()
                            .map(|(column, value)| format!("{}: {}", column, value))
                            .collect();
                        println!("{{ {} }}", rendered.join(", "));
                    }
                    println!("Total: {} rows", rows.len());
                }
                Err(e) => eprintln!("Error: {}", e),
            }
        }
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  create-table <name> <column> ... [--pk <column>]  - Create a table");
    println!("  insert <table> <column=value> ...                 - Insert a row");
    println!("  insert-url <table> <url>                          - Fetch a page and insert its article text");
    println!("  insert-file <table> <path>                        - Insert the contents of a text file");
    println!("  nearest <text> ...                                - Show the closest stored document");
    println!("  search <text> ... [--top N]                       - Show the N closest documents (default 5)");
    println!("  tables                                            - List tables");
    println!("  rows <table>                                      - List a table's rows");
    println!("  help                                              - Show this help");
    println!("  exit, quit                                        - Exit the program");
}
