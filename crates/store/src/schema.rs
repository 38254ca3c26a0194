//! DDL for the target store.
//!
//! The source table is owned by the upstream application; its DDL is kept
//! here only to seed local and test databases.

/// Target `clients` table: canonical columns plus identity, version,
/// timestamps and tombstone.
pub const CLIENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS clients (
    id BIGSERIAL PRIMARY KEY,
    nom VARCHAR(255) NOT NULL,
    prenom VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL,
    telephone VARCHAR(64),
    adresse TEXT,
    ville VARCHAR(255),
    code_postal VARCHAR(16),
    date_naissance DATE,
    statut VARCHAR(32) NOT NULL DEFAULT 'active',
    source_updated_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    deleted_at TIMESTAMPTZ,
    CONSTRAINT clients_email_key UNIQUE (email)
)
";

pub const CLIENTS_STATUT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS clients_statut_idx ON clients (statut)";

pub const CLIENTS_CREATED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS clients_created_at_idx ON clients (created_at DESC)";

/// Upstream `clients` table as the source application defines it.
pub const SOURCE_CLIENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS clients (
    id BIGSERIAL PRIMARY KEY,
    nom VARCHAR(255) NOT NULL,
    prenom VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    telephone VARCHAR(255),
    adresse TEXT,
    ville VARCHAR(255),
    code_postal VARCHAR(16),
    date_naissance DATE,
    statut VARCHAR(32),
    created_at TIMESTAMPTZ DEFAULT now(),
    updated_at TIMESTAMPTZ DEFAULT now()
)
";

pub const SOURCE_UPDATED_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS clients_updated_at_idx ON clients (updated_at)";

/// Returns target DDL in execution order.
pub fn target_tables() -> &'static [&'static str] {
    &[CLIENTS_TABLE, CLIENTS_STATUT_INDEX, CLIENTS_CREATED_INDEX]
}

/// Returns source DDL in execution order.
pub fn source_tables() -> &'static [&'static str] {
    &[SOURCE_CLIENTS_TABLE, SOURCE_UPDATED_INDEX]
}
