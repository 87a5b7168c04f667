use std::sync::{Arc, Mutex};

use tracing_subscriber::EnvFilter;
use zarrs_append::{
    append::{AppendOptions, AppendSession},
    array::{Array, DataType},
    storage::{
        store::FilesystemStore, ReadableWritableListableStorage, StorePrefix,
        UsageLogStorageAdapter,
    },
};

fn basic_types() -> Result<(), Box<dyn std::error::Error>> {
    // Log append session events with RUST_LOG=zarrs_append=debug
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = tempfile::TempDir::new()?;
    let mut store: ReadableWritableListableStorage =
        Arc::new(FilesystemStore::new(path.path().join("basic_types.zarr"))?);
    if let Some(arg1) = std::env::args().collect::<Vec<_>>().get(1) {
        if arg1 == "--usage-log" {
            let log_writer = Arc::new(Mutex::new(std::io::stdout()));
            store = Arc::new(UsageLogStorageAdapter::new(store, log_writer, || {
                "[usage] ".to_string()
            }));
        }
    }

    let data_types = [
        ("myinteights", DataType::Int8),
        ("myintsixteens", DataType::Int16),
        ("myintthirtytwos", DataType::Int32),
        ("myintsixtyfours", DataType::Int64),
        ("myfloatsixteens", DataType::Float16),
        ("myfloat64", DataType::Float64),
    ];

    let mut session = AppendSession::new(store.clone());
    for i in 0..200 {
        session.append(i, "default")?;
    }
    for (name, data_type) in data_types {
        let options = AppendOptions::builder().data_type(data_type).build();
        for i in 0..200 {
            // int8 cannot represent values above 127
            let value = if data_type == DataType::Int8 { i % 128 } else { i };
            session.append_with_options(value, name, &options)?;
        }
    }
    // Closing the session writes the remaining rows and trims every array
    session.close()?;

    let root = store.list_dir(&StorePrefix::root())?;
    println!(
        "{:?}",
        root.prefixes()
            .iter()
            .map(StorePrefix::as_str)
            .collect::<Vec<_>>()
    );
    for prefix in root.prefixes() {
        let array_path = format!("/{}", prefix.as_str().trim_end_matches('/'));
        let array = Array::open(store.clone(), &array_path)?;
        let elements = array.retrieve_ndarray()?;
        println!(
            "{array_path} {} {:?} {} sum={}",
            array.data_type(),
            array.shape(),
            elements.len() * array.data_type().size(),
            elements.sum()
        );
    }
    Ok(())
}

fn main() {
    if let Err(err) = basic_types() {
        println!("{:?}", err);
    }
}
