use curlite::{ffi, Connection};
use tracing::info;

/// Illustrative program for the handle layer: builds a small table, pulls a
/// scalar, walks a cursor, then touches the raw engine handle directly.
fn main() {
    // Initialize the logging system using tracing subscriber
    tracing_subscriber::fmt::init();

    info!("Starting curlite demo...");

    if let Err(e) = run() {
        eprintln!("curlite demo failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> curlite::Result<()> {
    let _ = std::fs::remove_file("demo.db");
    let db = Connection::open("demo.db")?;

    db.exec("create table test(id int primary key, value int);")?;

    for i in 0..100 {
        db.exec(&format!("insert into test values({}, {});", i, i * 2))?;
    }

    println!("Max: {}", db.exec_i64("select max(value) from test;")?);

    let mut cursor = db.cursor("select * from test order by value desc;")?;
    while cursor.read()? {
        println!(
            "{} = {}",
            cursor.value_named("id").unwrap_or(""),
            cursor.value_named("value").unwrap_or("")
        );
    }

    // Some arbitrary op to show that the engine handle is easy to get at
    // and anything can be done to it directly.
    unsafe { ffi::sqlite3_interrupt(db.raw_handle()) };

    Ok(())
}
