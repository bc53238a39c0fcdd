use super::*;
use crate::row::RowExt;
use crate::schema::{ColumnMetaData, SchemaRegistry, TableMetaData};
use crate::value::SqlValue;

#[derive(Debug, Clone, PartialEq)]
struct Person {
    id: i64,
    name: String,
    age: i32,
}

impl FromRow for Person {
    fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
        Ok(Self {
            id: row.try_get_column("id")?,
            name: row.try_get_column("name")?,
            age: row.try_get_column("age")?,
        })
    }
}

impl Record for Person {
    fn properties() -> Vec<PropertyDecl<Self>> {
        vec![
            PropertyDecl::new(
                "id",
                |p: &Person| SqlValue::from(p.id),
                |mut p, v| {
                    p.id = v.as_i64()?;
                    Ok(p)
                },
            )
            .pk(),
            PropertyDecl::new(
                "name",
                |p| SqlValue::from(p.name.clone()),
                |mut p, v| {
                    p.name = v.into_text()?;
                    Ok(p)
                },
            ),
            PropertyDecl::new(
                "age",
                |p| SqlValue::from(p.age),
                |mut p, v| {
                    p.age = v.as_i32()?;
                    Ok(p)
                },
            ),
        ]
    }
}

fn person_table() -> TableMetaData {
    TableMetaData {
        name: "person".into(),
        columns: vec![
            ColumnMetaData {
                name: "id".into(),
                sql_type: "bigint".into(),
                nullable: false,
            },
            ColumnMetaData {
                name: "name".into(),
                sql_type: "text".into(),
                nullable: false,
            },
            ColumnMetaData {
                name: "age".into(),
                sql_type: "integer".into(),
                nullable: false,
            },
        ],
    }
}

fn default_namers() -> Vec<Box<dyn ColumnNamer>> {
    vec![Box::new(SnakeCaseNamer)]
}

#[test]
fn extraction_binds_declared_properties_in_order() {
    let mapping = RecordMapping::<Person>::extract(&person_table(), &default_namers()).unwrap();

    assert_eq!(mapping.table_name(), "person");
    let columns: Vec<&str> = mapping.bindings().iter().map(|b| b.column()).collect();
    assert_eq!(columns, ["id", "name", "age"]);

    let non_pk: Vec<&str> = mapping.bindings_without_pk().map(|b| b.column()).collect();
    assert_eq!(non_pk, ["name", "age"]);

    let pk = mapping.pk_binding().unwrap();
    assert_eq!(pk.column(), "id");
    assert!(pk.is_pk());
}

#[test]
fn bindings_read_and_write_values() {
    let mapping = RecordMapping::<Person>::extract(&person_table(), &default_namers()).unwrap();
    let ann = Person {
        id: 0,
        name: "Ann".into(),
        age: 30,
    };

    let name = mapping.binding("name").unwrap();
    assert_eq!(name.get(&ann), SqlValue::Text("Ann".into()));

    let pk = mapping.pk_binding().unwrap();
    let with_id = pk.set(ann, SqlValue::I64(17)).unwrap();
    assert_eq!(with_id.id, 17);
    assert_eq!(with_id.name, "Ann");
}

#[test]
fn missing_column_fails_naming_type_property_and_table() {
    struct Stranger {
        nickname: String,
    }

    impl FromRow for Stranger {
        fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self {
                nickname: row.try_get_column("nickname")?,
            })
        }
    }

    impl Record for Stranger {
        fn properties() -> Vec<PropertyDecl<Self>> {
            vec![PropertyDecl::new(
                "nickname",
                |s| SqlValue::from(s.nickname.clone()),
                |mut s, v| {
                    s.nickname = v.into_text()?;
                    Ok(s)
                },
            )]
        }
    }

    let err = RecordMapping::<Stranger>::extract(&person_table(), &default_namers()).unwrap_err();
    assert!(err.is_metadata());
    let message = err.to_string();
    assert!(message.contains("person.nickname"));
    assert!(message.contains("Stranger"));
    assert!(message.contains("nickname"));
}

#[test]
fn explicit_column_override_wins_over_convention() {
    struct Renamed {
        id: i64,
        display: String,
    }

    impl FromRow for Renamed {
        fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self {
                id: row.try_get_column("id")?,
                display: row.try_get_column("name")?,
            })
        }
    }

    impl Record for Renamed {
        fn properties() -> Vec<PropertyDecl<Self>> {
            vec![
                PropertyDecl::new(
                    "id",
                    |r| SqlValue::from(r.id),
                    |mut r, v| {
                        r.id = v.as_i64()?;
                        Ok(r)
                    },
                ),
                PropertyDecl::new(
                    "display",
                    |r: &Renamed| SqlValue::from(r.display.clone()),
                    |mut r, v| {
                        r.display = v.into_text()?;
                        Ok(r)
                    },
                )
                .column("name"),
            ]
        }
    }

    let mapping = RecordMapping::<Renamed>::extract(&person_table(), &default_namers()).unwrap();
    assert_eq!(mapping.binding("display").unwrap().column(), "name");
}

#[test]
fn pk_falls_back_to_property_named_id() {
    struct Implicit {
        id: i64,
        name: String,
    }

    impl FromRow for Implicit {
        fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self {
                id: row.try_get_column("id")?,
                name: row.try_get_column("name")?,
            })
        }
    }

    impl Record for Implicit {
        fn properties() -> Vec<PropertyDecl<Self>> {
            vec![
                PropertyDecl::new(
                    "id",
                    |r| SqlValue::from(r.id),
                    |mut r, v| {
                        r.id = v.as_i64()?;
                        Ok(r)
                    },
                ),
                PropertyDecl::new(
                    "name",
                    |r| SqlValue::from(r.name.clone()),
                    |mut r, v| {
                        r.name = v.into_text()?;
                        Ok(r)
                    },
                ),
            ]
        }
    }

    let mapping = RecordMapping::<Implicit>::extract(&person_table(), &default_namers()).unwrap();
    let pk = mapping.pk_binding().unwrap();
    assert_eq!(pk.property(), "id");
    assert!(pk.is_pk());
}

#[test]
fn conflicting_duplicate_declarations_fail() {
    struct Conflicted {
        name: String,
    }

    impl FromRow for Conflicted {
        fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self {
                name: row.try_get_column("name")?,
            })
        }
    }

    impl Record for Conflicted {
        fn properties() -> Vec<PropertyDecl<Self>> {
            let get: fn(&Self) -> SqlValue = |r| SqlValue::from(r.name.clone());
            let set: fn(Self, SqlValue) -> MapperResult<Self> = |mut r, v| {
                r.name = v.into_text()?;
                Ok(r)
            };
            vec![
                PropertyDecl::new("name", get, set).column("name"),
                PropertyDecl::new("name", get, set).column("age"),
            ]
        }
    }

    let err = RecordMapping::<Conflicted>::extract(&person_table(), &default_namers()).unwrap_err();
    assert!(err.is_metadata());
    assert!(err.to_string().contains("conflicting declarations"));
}

#[test]
fn identical_duplicate_declarations_collapse() {
    struct Doubled {
        name: String,
    }

    impl FromRow for Doubled {
        fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self {
                name: row.try_get_column("name")?,
            })
        }
    }

    impl Record for Doubled {
        fn properties() -> Vec<PropertyDecl<Self>> {
            let get: fn(&Self) -> SqlValue = |r| SqlValue::from(r.name.clone());
            let set: fn(Self, SqlValue) -> MapperResult<Self> = |mut r, v| {
                r.name = v.into_text()?;
                Ok(r)
            };
            vec![
                PropertyDecl::new("name", get, set),
                PropertyDecl::new("name", get, set),
            ]
        }
    }

    let mapping = RecordMapping::<Doubled>::extract(&person_table(), &default_namers()).unwrap();
    assert_eq!(mapping.bindings().len(), 1);
}

#[test]
fn two_explicit_primary_keys_fail() {
    struct TwoKeys {
        id: i64,
        age: i32,
    }

    impl FromRow for TwoKeys {
        fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self {
                id: row.try_get_column("id")?,
                age: row.try_get_column("age")?,
            })
        }
    }

    impl Record for TwoKeys {
        fn properties() -> Vec<PropertyDecl<Self>> {
            vec![
                PropertyDecl::new(
                    "id",
                    |r: &TwoKeys| SqlValue::from(r.id),
                    |mut r, v| {
                        r.id = v.as_i64()?;
                        Ok(r)
                    },
                )
                .pk(),
                PropertyDecl::new(
                    "age",
                    |r: &TwoKeys| SqlValue::from(r.age),
                    |mut r, v| {
                        r.age = v.as_i32()?;
                        Ok(r)
                    },
                )
                .pk(),
            ]
        }
    }

    let err = RecordMapping::<TwoKeys>::extract(&person_table(), &default_namers()).unwrap_err();
    assert!(err.to_string().contains("more than one primary key"));
}

#[test]
fn ignored_properties_are_not_mapped() {
    struct WithScratch {
        id: i64,
        scratch: String,
    }

    impl FromRow for WithScratch {
        fn from_row(row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self {
                id: row.try_get_column("id")?,
                scratch: String::new(),
            })
        }
    }

    impl Record for WithScratch {
        fn properties() -> Vec<PropertyDecl<Self>> {
            vec![
                PropertyDecl::new(
                    "id",
                    |r| SqlValue::from(r.id),
                    |mut r, v| {
                        r.id = v.as_i64()?;
                        Ok(r)
                    },
                ),
                PropertyDecl::new(
                    "scratch",
                    |r: &WithScratch| SqlValue::from(r.scratch.clone()),
                    |mut r, v| {
                        r.scratch = v.into_text()?;
                        Ok(r)
                    },
                )
                .ignore(),
            ]
        }
    }

    let mapping = RecordMapping::<WithScratch>::extract(&person_table(), &default_namers()).unwrap();
    assert_eq!(mapping.bindings().len(), 1);
    assert!(mapping.binding("scratch").is_none());
}

#[test]
fn table_name_derives_from_record_name() {
    struct OrderLine;

    impl FromRow for OrderLine {
        fn from_row(_row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self)
        }
    }

    impl Record for OrderLine {
        fn properties() -> Vec<PropertyDecl<Self>> {
            Vec::new()
        }
    }

    assert_eq!(table_name_of::<OrderLine>(), "order_line");
    assert_eq!(table_name_of::<Person>(), "person");
}

#[test]
fn explicit_table_name_wins() {
    struct Legacy;

    impl FromRow for Legacy {
        fn from_row(_row: &tokio_postgres::Row) -> MapperResult<Self> {
            Ok(Self)
        }
    }

    impl Record for Legacy {
        fn table_name() -> Option<&'static str> {
            Some("tbl_legacy")
        }

        fn properties() -> Vec<PropertyDecl<Self>> {
            Vec::new()
        }
    }

    assert_eq!(table_name_of::<Legacy>(), "tbl_legacy");
}

#[test]
fn pk_strategy_variants() {
    assert!(PkStrategy::AutoIncrement.is_auto_increment());
    assert!(!PkStrategy::uuid_v4().is_auto_increment());

    match PkStrategy::uuid_v4() {
        PkStrategy::Provided(generate) => {
            assert!(matches!(generate(), Some(SqlValue::Uuid(_))));
        }
        PkStrategy::AutoIncrement => unreachable!(),
    }

    match PkStrategy::caller_supplied() {
        PkStrategy::Provided(generate) => assert!(generate().is_none()),
        PkStrategy::AutoIncrement => unreachable!(),
    }
}

#[tokio::test]
async fn registry_resolves_against_seeded_schema() {
    struct PanicClient;

    impl crate::client::GenericClient for PanicClient {
        async fn query(
            &self,
            _sql: &str,
            _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        ) -> MapperResult<Vec<tokio_postgres::Row>> {
            panic!("unexpected query() call")
        }

        async fn query_one(
            &self,
            _sql: &str,
            _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        ) -> MapperResult<tokio_postgres::Row> {
            panic!("unexpected query_one() call")
        }

        async fn query_opt(
            &self,
            _sql: &str,
            _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        ) -> MapperResult<Option<tokio_postgres::Row>> {
            panic!("unexpected query_opt() call")
        }

        async fn execute(
            &self,
            _sql: &str,
            _params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
        ) -> MapperResult<u64> {
            panic!("unexpected execute() call")
        }
    }

    let schema = SchemaRegistry::new();
    schema.register_table(person_table());
    let registry = MappingRegistry::with_schema(schema);

    let first = registry.mapping::<Person>(&PanicClient).await.unwrap();
    let second = registry.mapping::<Person>(&PanicClient).await.unwrap();

    assert_eq!(first.table_name(), "person");
    assert!(Arc::ptr_eq(&first, &second));
}
