//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use rand::Rng;
use scopelite_core::{Connection, SqlResult};

/// Generate random blob data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate random ASCII text of the specified length.
pub fn random_text(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect()
}

/// Opens an in-memory database holding `Items(id, payload)` with `rows`
/// rows of `payload_size` random bytes.
pub fn populated_database(rows: usize, payload_size: usize) -> SqlResult<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute("create table Items (id integer primary key, payload blob)")?;
    conn.execute("begin")?;
    let mut insert = conn.prepare("insert into Items (payload) values (?)")?;
    for _ in 0..rows {
        let payload = random_data(payload_size);
        insert.bind(1, &payload)?;
        insert.execute()?;
        insert.reset()?;
    }
    drop(insert);
    conn.execute("commit")?;
    Ok(conn)
}
