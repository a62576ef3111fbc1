// Schema initializer: ordered CREATE ... IF NOT EXISTS statements per variant

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use tracing::{info, instrument};

use crate::errors::DatabaseError;

/// A table and the idempotent statements that bring it into existence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: &'static str,
    pub statements: &'static [&'static str],
}

/// Which set of tables the process manages, chosen once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaVariant {
    Todo,
    Airline,
}

impl SchemaVariant {
    /// Tables in dependency order: referenced tables come first
    pub fn tables(self) -> &'static [TableDefinition] {
        match self {
            SchemaVariant::Todo => TODO_TABLES,
            SchemaVariant::Airline => AIRLINE_TABLES,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SchemaVariant::Todo => "todo",
            SchemaVariant::Airline => "airline",
        }
    }
}

impl fmt::Display for SchemaVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(SchemaVariant::Todo),
            "airline" => Ok(SchemaVariant::Airline),
            other => Err(format!("Unknown schema variant: {}", other)),
        }
    }
}

const TODO_TABLES: &[TableDefinition] = &[
    TableDefinition {
        name: "users",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS users (
                id SERIAL PRIMARY KEY,
                username VARCHAR(80) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                full_name VARCHAR(255) NOT NULL DEFAULT '',
                is_active BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#],
    },
    TableDefinition {
        name: "todos",
        statements: &[
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id SERIAL PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users (id) ON DELETE RESTRICT,
                title VARCHAR(255) NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                completed BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_todos_user_id ON todos (user_id)",
        ],
    },
];

const AIRLINE_TABLES: &[TableDefinition] = &[
    TableDefinition {
        name: "airplanes",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS airplanes (
                code CHAR(3) PRIMARY KEY,
                model TEXT NOT NULL,
                range_km INTEGER NOT NULL CHECK (range_km > 0)
            )
            "#],
    },
    TableDefinition {
        name: "airports",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS airports (
                code CHAR(3) PRIMARY KEY,
                name TEXT NOT NULL,
                city TEXT NOT NULL,
                timezone TEXT NOT NULL
            )
            "#],
    },
    TableDefinition {
        name: "seats",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS seats (
                airplane_code CHAR(3) NOT NULL REFERENCES airplanes (code) ON DELETE CASCADE,
                seat_no VARCHAR(4) NOT NULL,
                fare_conditions VARCHAR(10) NOT NULL
                    CHECK (fare_conditions IN ('Economy', 'Comfort', 'Business')),
                PRIMARY KEY (airplane_code, seat_no)
            )
            "#],
    },
    TableDefinition {
        name: "routes",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS routes (
                id SERIAL PRIMARY KEY,
                route_no CHAR(6) NOT NULL UNIQUE,
                departure_airport CHAR(3) NOT NULL REFERENCES airports (code),
                arrival_airport CHAR(3) NOT NULL REFERENCES airports (code),
                airplane_code CHAR(3) NOT NULL REFERENCES airplanes (code),
                duration INTERVAL NOT NULL,
                CHECK (departure_airport <> arrival_airport)
            )
            "#],
    },
    TableDefinition {
        name: "flights",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS flights (
                id SERIAL PRIMARY KEY,
                route_id INTEGER NOT NULL REFERENCES routes (id),
                scheduled_departure TIMESTAMPTZ NOT NULL,
                scheduled_arrival TIMESTAMPTZ NOT NULL,
                actual_departure TIMESTAMPTZ,
                actual_arrival TIMESTAMPTZ,
                status VARCHAR(20) NOT NULL DEFAULT 'Scheduled',
                UNIQUE (route_id, scheduled_departure),
                CHECK (scheduled_arrival > scheduled_departure)
            )
            "#],
    },
    TableDefinition {
        name: "bookings",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS bookings (
                book_ref CHAR(6) PRIMARY KEY,
                book_date TIMESTAMPTZ NOT NULL DEFAULT now(),
                total_amount NUMERIC(10, 2) NOT NULL CHECK (total_amount >= 0)
            )
            "#],
    },
    TableDefinition {
        name: "tickets",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS tickets (
                ticket_no CHAR(13) PRIMARY KEY,
                book_ref CHAR(6) NOT NULL REFERENCES bookings (book_ref),
                passenger_name TEXT NOT NULL,
                contact_data JSONB
            )
            "#],
    },
    TableDefinition {
        name: "segments",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS segments (
                ticket_no CHAR(13) NOT NULL REFERENCES tickets (ticket_no),
                flight_id INTEGER NOT NULL REFERENCES flights (id),
                fare_conditions VARCHAR(10) NOT NULL
                    CHECK (fare_conditions IN ('Economy', 'Comfort', 'Business')),
                amount NUMERIC(10, 2) NOT NULL CHECK (amount >= 0),
                PRIMARY KEY (ticket_no, flight_id)
            )
            "#],
    },
    TableDefinition {
        name: "boarding_passes",
        statements: &[r#"
            CREATE TABLE IF NOT EXISTS boarding_passes (
                ticket_no CHAR(13) NOT NULL,
                flight_id INTEGER NOT NULL,
                boarding_no INTEGER NOT NULL,
                seat_no VARCHAR(4) NOT NULL,
                PRIMARY KEY (ticket_no, flight_id),
                FOREIGN KEY (ticket_no, flight_id) REFERENCES segments (ticket_no, flight_id),
                UNIQUE (flight_id, seat_no),
                UNIQUE (flight_id, boarding_no)
            )
            "#],
    },
];

/// Creates the tables of a schema variant when they are missing
#[derive(Debug, Clone)]
pub struct SchemaInitializer {
    pool: PgPool,
}

impl SchemaInitializer {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create every missing table of `variant` in a single transaction.
    ///
    /// Returns the table names in the order they were ensured. Failures such
    /// as missing privileges are returned to the caller and never retried.
    #[instrument(skip(self))]
    pub async fn ensure(&self, variant: SchemaVariant) -> Result<Vec<&'static str>, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(|e| DatabaseError::SchemaInitFailed {
            table: "<transaction>".to_string(),
            reason: e.to_string(),
        })?;

        let mut ensured = Vec::with_capacity(variant.tables().len());
        for table in variant.tables() {
            for statement in table.statements {
                sqlx::query(statement)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        tracing::error!(table = table.name, error = %e, "Error creating table");
                        DatabaseError::SchemaInitFailed {
                            table: table.name.to_string(),
                            reason: e.to_string(),
                        }
                    })?;
            }
            tracing::debug!(table = table.name, "Table ensured");
            ensured.push(table.name);
        }

        tx.commit().await.map_err(|e| DatabaseError::SchemaInitFailed {
            table: "<commit>".to_string(),
            reason: e.to_string(),
        })?;

        info!(tables = ensured.len(), "Tables created successfully");
        Ok(ensured)
    }

    /// Names of the tables of `variant` currently present in the `public` schema
    #[instrument(skip(self))]
    pub async fn existing_tables(&self, variant: SchemaVariant) -> Result<Vec<String>, DatabaseError> {
        let wanted: Vec<&str> = variant.tables().iter().map(|t| t.name).collect();
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT table_name::text
            FROM information_schema.tables
            WHERE table_schema = 'public' AND table_name = ANY($1)
            ORDER BY table_name
            "#,
        )
        .bind(&wanted)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(name,)| name).collect())
    }
}
