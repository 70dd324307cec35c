// End-to-end gateway behaviour against the in-process reference warehouse.

use std::io;
use std::sync::{Arc, Mutex};

use spiritfood_warehouse::backend::BackendRegistry;
use spiritfood_warehouse::core::{ConfigurationError, QueryError, SchemaError, WriteError};
use spiritfood_warehouse::frame::{LocalColumn, LocalDtype, SparkType, StructField};
use spiritfood_warehouse::{
    ComputePolicy, ComputeSessionRegistry, ConfigLoader, ConnectionConfig, ConnectionOverrides,
    DistributedFrame, ExecutionMode, FallbackPolicy, Frame, GatewayBuilder, GatewayError,
    LocalFrame, MemoryWarehouse, Params, Value, WarehouseGateway, WarehouseType, WriteMode,
};
use tracing_subscriber::fmt::MakeWriter;

fn warehouse() -> MemoryWarehouse {
    let wh = MemoryWarehouse::new("acme");
    wh.create_user("loader", "pw");
    wh
}

fn config() -> ConnectionConfig {
    ConfigLoader::isolated()
        .load(
            &ConnectionOverrides::new()
                .account("acme")
                .user("loader")
                .password("pw"),
        )
        .unwrap()
}

fn builder(wh: &MemoryWarehouse) -> GatewayBuilder {
    WarehouseGateway::builder(wh.registry())
        .config(config())
        .session_registry(Arc::new(ComputeSessionRegistry::new()))
        .compute_policy(ComputePolicy::Disabled)
}

/// In-memory log sink for asserting on emitted warnings.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

struct LogWriter(Arc<Mutex<Vec<u8>>>);

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter(Arc::clone(&self.0))
    }
}

impl io::Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl LogBuffer {
    fn capture<T>(&self, body: impl FnOnce() -> T) -> T {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, body)
    }

    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

fn menu_frame() -> Frame {
    Frame::Local(
        LocalFrame::from_columns(vec![
            LocalColumn::infer(
                "name",
                vec!["ramen".into(), "pho".into(), "tacos".into()],
            ),
            LocalColumn::infer("qty", vec![3.into(), 1.into(), 12.into()]),
        ])
        .unwrap(),
    )
}

#[test]
fn test_missing_credentials_are_named_in_order() {
    let err = ConfigLoader::isolated()
        .load(&ConnectionOverrides::new())
        .unwrap_err();
    assert_eq!(
        err,
        ConfigurationError::MissingFields(vec!["account", "user", "password"])
    );

    let err = WarehouseGateway::builder(warehouse().registry())
        .config_loader(ConfigLoader::isolated())
        .overrides(ConnectionOverrides::new().account("acme").user("loader"))
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        GatewayError::Configuration(ConfigurationError::MissingFields(ref fields)) if fields == &vec!["password"]
    ));
}

#[test]
fn test_wrong_password_is_connection_error() {
    let wh = warehouse();
    let bad = ConfigLoader::isolated()
        .load(
            &ConnectionOverrides::new()
                .account("acme")
                .user("loader")
                .password("nope"),
        )
        .unwrap();

    let result = WarehouseGateway::builder(wh.registry())
        .config(bad)
        .compute_policy(ComputePolicy::Disabled)
        .open();
    assert!(matches!(result, Err(GatewayError::Connection(_))));
    assert_eq!(wh.stats().open_connections(), 0);
}

#[test]
fn test_result_columns_are_lowercased_in_every_mode() {
    let wh = warehouse();
    wh.execute(r#"CREATE TABLE consumers ("Consumer_ID" INTEGER, NAME STRING)"#)
        .unwrap();
    wh.execute("INSERT INTO consumers VALUES (1, 'fiona'), (2, 'gus')")
        .unwrap();

    let mut gw = builder(&wh)
        .compute_policy(ComputePolicy::Private)
        .open()
        .unwrap();
    for mode in [
        ExecutionMode::Driver,
        ExecutionMode::Distributed,
        ExecutionMode::Columnar,
    ] {
        let result = gw
            .execute("SELECT * FROM consumers", mode, &Params::new())
            .unwrap();
        assert_eq!(result.column_names(), vec!["consumer_id", "name"], "{mode}");
        assert_eq!(result.row_count(), 2, "{mode}");
    }
    gw.close();
}

#[test]
fn test_zero_row_select_keeps_columns() {
    let wh = warehouse();
    wh.execute("CREATE TABLE consumers (CONSUMER_ID INTEGER, NAME STRING)")
        .unwrap();

    let mut gw = builder(&wh).open().unwrap();
    let result = gw
        .execute(
            "SELECT CONSUMER_ID, NAME FROM consumers WHERE NAME = 'nobody'",
            ExecutionMode::Driver,
            &Params::new(),
        )
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(result.column_names(), vec!["consumer_id", "name"]);
}

#[test]
fn test_bound_parameters() {
    let wh = warehouse();
    wh.execute("CREATE TABLE consumers (CONSUMER_ID INTEGER, NAME STRING)")
        .unwrap();
    wh.execute("INSERT INTO consumers VALUES (1, 'fiona'), (2, 'gus')")
        .unwrap();

    let mut gw = builder(&wh).open().unwrap();
    let result = gw
        .fetch(
            "SELECT consumer_id FROM consumers WHERE name = :who",
            &Params::new().bind("who", "gus"),
        )
        .unwrap();
    assert_eq!(result.get(0, "consumer_id"), Some(&Value::Integer(2)));

    let err = gw
        .fetch("SELECT consumer_id FROM consumers WHERE name = :who", &Params::new())
        .unwrap_err();
    assert!(matches!(err, GatewayError::Query(QueryError::Backend { .. })));
}

#[test]
fn test_unavailable_mode_falls_back_or_fails() {
    let wh = warehouse();
    wh.execute("CREATE TABLE t (ID INTEGER)").unwrap();
    let driver_only = BackendRegistry::new(Arc::new(wh.driver()));

    let mut lenient = WarehouseGateway::builder(driver_only.clone())
        .config(config())
        .compute_policy(ComputePolicy::Disabled)
        .open()
        .unwrap();
    assert_eq!(lenient.available_modes(), vec![ExecutionMode::Driver]);
    assert!(lenient
        .execute("SELECT * FROM t", ExecutionMode::Columnar, &Params::new())
        .is_ok());

    let mut strict = WarehouseGateway::builder(driver_only)
        .config(config())
        .compute_policy(ComputePolicy::Disabled)
        .fallback_policy(FallbackPolicy::Strict)
        .open()
        .unwrap();
    let err = strict
        .execute("SELECT * FROM t", ExecutionMode::Columnar, &Params::new())
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Query(QueryError::Unavailable(ExecutionMode::Columnar))
    ));
}

#[test]
fn test_infer_rejects_duplicate_columns_in_both_representations() {
    let wh = warehouse();
    let gw = builder(&wh).build().unwrap();

    let local = Frame::Local(
        LocalFrame::from_columns(vec![
            LocalColumn::infer("a", vec![1.into()]),
            LocalColumn::infer("a", vec![2.into()]),
        ])
        .unwrap(),
    );
    let distributed = Frame::Distributed(
        DistributedFrame::new(
            vec![
                StructField::new("a", SparkType::Long),
                StructField::new("a", SparkType::String),
            ],
            vec![vec![1.into(), "x".into()]],
            None,
        )
        .unwrap(),
    );

    for frame in [local, distributed] {
        let err = gw.infer(&frame, "t", None, None).unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Schema(SchemaError::DuplicateColumns(ref names)) if names == &vec!["a".to_string()]
        ));
    }
    assert!(wh.table_names().is_empty());
}

#[test]
fn test_infer_unrecognized_types_become_string() {
    let wh = warehouse();
    let gw = builder(&wh).build().unwrap();
    let logs = LogBuffer::default();

    let local = Frame::Local(
        LocalFrame::from_columns(vec![
            LocalColumn::new("mood", LocalDtype::Category, vec!["happy".into()]),
            LocalColumn::infer("score", vec![1.5.into()]),
        ])
        .unwrap(),
    );
    let ddl = logs
        .capture(|| gw.infer(&local, "moods", Some("analytics"), None))
        .unwrap();
    assert_eq!(ddl.table.qualified(), "proddb.analytics.moods");
    assert_eq!(
        ddl.columns,
        vec![
            ("mood".to_string(), WarehouseType::String),
            ("score".to_string(), WarehouseType::Float),
        ]
    );

    let distributed = Frame::Distributed(
        DistributedFrame::new(
            vec![StructField::new("gap", SparkType::CalendarInterval)],
            vec![vec![Value::Null]],
            None,
        )
        .unwrap(),
    );
    let ddl = logs
        .capture(|| gw.infer(&distributed, "gaps", None, None))
        .unwrap();
    assert_eq!(ddl.columns, vec![("gap".to_string(), WarehouseType::String)]);

    let text = logs.text();
    let warnings: Vec<&str> = text.lines().filter(|l| l.contains("WARN")).collect();
    assert_eq!(warnings.len(), 2, "{text}");
    assert!(warnings[0].contains("Column 'mood' has unrecognized type category, using STRING"));
    assert!(warnings[1].contains("Column 'gap' has unrecognized type"));
    assert!(!text.contains("Column 'score'"));
}

#[test]
fn test_duplicate_columns_differing_only_in_case() {
    let wh = warehouse();
    let mut gw = builder(&wh).open().unwrap();
    let frame = Frame::Local(
        LocalFrame::from_columns(vec![
            LocalColumn::infer("id", vec![1.into()]),
            LocalColumn::infer("ID", vec![2.into()]),
        ])
        .unwrap(),
    );

    let err = gw.infer(&frame, "ids", None, None).unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Schema(SchemaError::DuplicateColumns(ref names)) if names == &vec!["ID".to_string()]
    ));
    assert!(matches!(
        gw.create_and_populate(&frame, "ids", None, None, None),
        Err(GatewayError::Schema(SchemaError::DuplicateColumns(_)))
    ));

    let err = gw.write("ids", &frame, None, WriteMode::Append).unwrap_err();
    assert!(matches!(err, GatewayError::Write(WriteError::Backend { .. })));
    assert!(wh.table("proddb.public.ids").is_none());

    assert!(wh.execute("CREATE TABLE ids (id INTEGER, ID STRING)").is_err());
    assert!(wh.table_names().is_empty());
}

#[test]
fn test_append_twice_keeps_both_batches_and_grants() {
    let wh = warehouse();
    let mut gw = builder(&wh).open().unwrap();

    assert!(gw.write("menu", &menu_frame(), None, WriteMode::Append).unwrap());
    assert!(gw.write("menu", &menu_frame(), None, WriteMode::Append).unwrap());
    gw.close();

    assert_eq!(wh.row_count("proddb.public.menu"), Some(6));
    let grants = wh.grants_on("proddb.public.menu");
    assert_eq!(grants.len(), 2);
    assert!(grants.iter().any(|g| g.role == "READ_ONLY_USERS"));
    assert!(grants.iter().any(|g| g.role == "SYSADMIN"));
}

#[test]
fn test_failed_write_grants_nothing() {
    let wh = warehouse();
    wh.execute("CREATE TABLE menu (NAME STRING, QTY INTEGER)").unwrap();

    let mut gw = builder(&wh).open().unwrap();
    let err = gw
        .write("menu", &menu_frame(), None, WriteMode::ErrorIfExists)
        .unwrap_err();
    assert!(matches!(err, GatewayError::Write(WriteError::Backend { .. })));
    assert!(wh.grants_on("proddb.public.menu").is_empty());
    assert_eq!(wh.row_count("proddb.public.menu"), Some(0));
}

#[test]
fn test_create_and_populate_then_recreate_is_destructive() {
    let wh = warehouse();
    let mut gw = builder(&wh).open().unwrap();
    let frame = menu_frame();

    assert!(gw.create_and_populate(&frame, "menu", None, None, None).unwrap());
    assert_eq!(wh.row_count("proddb.public.menu"), Some(3));
    assert_eq!(wh.grants_on("proddb.public.menu").len(), 2);

    let ddl = gw.infer(&frame, "menu", None, None).unwrap();
    assert!(ddl.statement.starts_with("CREATE OR REPLACE TABLE proddb.public.menu"));
    gw.execute_statement(&ddl.statement).unwrap();
    assert_eq!(wh.row_count("proddb.public.menu"), Some(0));
}

#[test]
fn test_scoped_closes_once_on_error() {
    let wh = warehouse();
    let result: Result<(), GatewayError> = WarehouseGateway::scoped(builder(&wh), |gw| {
        gw.execute("SELECT * FROM missing", ExecutionMode::Driver, &Params::new())?;
        Ok(())
    });
    assert!(matches!(result, Err(GatewayError::Query(_))));

    let stats = wh.stats();
    assert_eq!(stats.connections_opened, 1);
    assert_eq!(stats.connections_closed, 1);
}

#[test]
fn test_close_is_idempotent() {
    let wh = warehouse();
    let mut gw = builder(&wh)
        .compute_policy(ComputePolicy::Private)
        .open()
        .unwrap();
    assert!(gw.is_connected());
    gw.close();
    gw.close();
    drop(gw);

    let stats = wh.stats();
    assert_eq!(stats.connections_closed, 1);
    assert_eq!(stats.sessions_created, 1);
    assert_eq!(stats.sessions_stopped, 1);
}

#[test]
fn test_persistent_session_is_shared() {
    let wh = warehouse();
    let sessions = Arc::new(ComputeSessionRegistry::new());
    let persistent = |force_new| {
        WarehouseGateway::builder(wh.registry())
            .config(config())
            .session_registry(Arc::clone(&sessions))
            .compute_policy(ComputePolicy::Persistent { force_new })
            .build()
            .unwrap()
    };

    let first = persistent(false);
    let second = persistent(false);
    let first_id = first.compute_session().unwrap().id();
    assert_eq!(second.compute_session().unwrap().id(), first_id);
    drop(first);
    drop(second);
    assert_eq!(wh.stats().sessions_created, 1);
    assert_eq!(wh.stats().sessions_stopped, 0);

    let forced = persistent(true);
    assert_ne!(forced.compute_session().unwrap().id(), first_id);
    drop(forced);
    assert_eq!(wh.stats().sessions_created, 2);

    let app_name = config().compute().app_name.clone();
    assert!(sessions.shutdown(&app_name));
    assert!(!sessions.shutdown(&app_name));
    // the replaced session is dropped, only the forced one is stopped
    assert_eq!(wh.stats().sessions_stopped, 1);
}

#[test]
fn test_stopped_persistent_session_falls_back_to_driver() {
    let wh = warehouse();
    wh.execute("CREATE TABLE t (ID INTEGER)").unwrap();
    wh.execute("INSERT INTO t VALUES (1)").unwrap();
    let sessions = Arc::new(ComputeSessionRegistry::new());
    let persistent = |fallback| {
        WarehouseGateway::builder(wh.registry())
            .config(config())
            .session_registry(Arc::clone(&sessions))
            .compute_policy(ComputePolicy::Persistent { force_new: false })
            .fallback_policy(fallback)
            .open()
            .unwrap()
    };

    let mut lenient = persistent(FallbackPolicy::Driver);
    let mut strict = persistent(FallbackPolicy::Strict);
    assert!(lenient.is_available(ExecutionMode::Distributed));

    // another holder shuts the shared session down
    assert!(sessions.shutdown(&config().compute().app_name));

    assert!(!lenient.is_available(ExecutionMode::Distributed));
    assert!(!lenient.available_modes().contains(&ExecutionMode::Distributed));
    let result = lenient
        .execute("SELECT * FROM t", ExecutionMode::Distributed, &Params::new())
        .unwrap();
    assert_eq!(result.row_count(), 1);
    assert!(lenient
        .write("menu", &menu_frame(), Some(ExecutionMode::Distributed), WriteMode::Append)
        .unwrap());
    assert_eq!(wh.row_count("proddb.public.menu"), Some(3));
    assert!(matches!(
        lenient.read_distributed("SELECT * FROM t", &Params::new()),
        Err(GatewayError::Query(QueryError::Unavailable(ExecutionMode::Distributed)))
    ));

    let err = strict
        .execute("SELECT * FROM t", ExecutionMode::Distributed, &Params::new())
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Query(QueryError::Unavailable(ExecutionMode::Distributed))
    ));
    let err = strict
        .write("menu", &menu_frame(), Some(ExecutionMode::Distributed), WriteMode::Append)
        .unwrap_err();
    assert!(matches!(
        err,
        GatewayError::Write(WriteError::Unavailable(ExecutionMode::Distributed))
    ));
}

#[test]
fn test_compute_outage_degrades_private_but_fails_persistent() {
    let wh = warehouse();
    wh.set_compute_offline(true);
    wh.execute("CREATE TABLE t (ID INTEGER)").unwrap();

    let mut private = builder(&wh)
        .compute_policy(ComputePolicy::Private)
        .build()
        .unwrap();
    assert!(private.compute_session().is_none());
    assert!(!private.is_available(ExecutionMode::Distributed));
    assert!(private
        .execute("SELECT * FROM t", ExecutionMode::Distributed, &Params::new())
        .is_ok());

    let persistent = builder(&wh)
        .compute_policy(ComputePolicy::Persistent { force_new: false })
        .build();
    assert!(matches!(persistent, Err(GatewayError::Connection(_))));
}

#[test]
fn test_distributed_round_trip() {
    let wh = warehouse();
    let mut gw = builder(&wh)
        .compute_policy(ComputePolicy::Private)
        .open()
        .unwrap();

    gw.write("menu", &menu_frame(), Some(ExecutionMode::Distributed), WriteMode::Overwrite)
        .unwrap();
    let frame = gw
        .read_distributed("SELECT * FROM menu WHERE qty > 2", &Params::new())
        .unwrap();
    let names: Vec<&str> = frame.schema().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["name", "qty"]);
    assert_eq!(frame.rows().len(), 2);

    gw.write("big_orders", &Frame::Distributed(frame), None, WriteMode::Append)
        .unwrap();
    assert_eq!(wh.row_count("proddb.public.big_orders"), Some(2));
    assert_eq!(wh.grants_on("proddb.public.big_orders").len(), 2);
}

#[test]
fn test_drop_table() {
    let wh = warehouse();
    let mut gw = builder(&wh).open().unwrap();
    gw.write("menu", &menu_frame(), None, WriteMode::Append).unwrap();

    gw.drop_table("menu").unwrap();
    gw.drop_table("menu").unwrap();
    assert!(wh.table("proddb.public.menu").is_none());
}

#[test]
fn test_snapshot_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("warehouse.db");

    let wh = warehouse();
    let mut gw = builder(&wh).open().unwrap();
    gw.write("menu", &menu_frame(), None, WriteMode::Append).unwrap();
    gw.close();
    wh.save(&path).unwrap();

    let reloaded = MemoryWarehouse::load(&path).unwrap();
    let mut gw = builder(&reloaded).open().unwrap();
    let result = gw
        .execute("SELECT name FROM menu ORDER BY qty DESC", ExecutionMode::Driver, &Params::new())
        .unwrap();
    assert_eq!(result.get(0, "name"), Some(&Value::Text("tacos".into())));
    assert_eq!(reloaded.grants_on("proddb.public.menu").len(), 2);
}
