pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE domains (
  domain_id       INTEGER PRIMARY KEY AUTOINCREMENT,
  user_name       TEXT NOT NULL,
  domain          TEXT NOT NULL,
  status          TEXT NOT NULL DEFAULT 'Pending',
  ssl_expiration  TEXT NOT NULL DEFAULT 'N/A',
  ssl_issuer      TEXT NOT NULL DEFAULT 'N/A',
  added_at        INTEGER NOT NULL,
  UNIQUE (user_name, domain)
);

CREATE INDEX idx_domains_user ON domains(user_name);

COMMIT;
"#
;
