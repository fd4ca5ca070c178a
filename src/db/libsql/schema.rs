/// Tables used by the service. Idempotent.
pub(super) const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS clinicaltrials (
    trial_id INTEGER PRIMARY KEY AUTOINCREMENT,
    trial_name TEXT NOT NULL,
    trial_status TEXT NOT NULL DEFAULT 'planned',
    trial_description TEXT,
    trial_start TEXT,
    trial_end TEXT
);

CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_type TEXT NOT NULL,
    user_firstname TEXT NOT NULL,
    user_lastname TEXT NOT NULL,
    user_participant_code TEXT,
    user_email TEXT
);

CREATE TABLE IF NOT EXISTS trialstaffroles (
    role_id INTEGER PRIMARY KEY AUTOINCREMENT,
    role_name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS trialstaff (
    trialstaff_id INTEGER PRIMARY KEY AUTOINCREMENT,
    trial_id INTEGER NOT NULL REFERENCES clinicaltrials(trial_id) ON DELETE CASCADE,
    user_id INTEGER NOT NULL REFERENCES users(user_id),
    role_id INTEGER NOT NULL REFERENCES trialstaffroles(role_id),
    trialstaff_start TEXT,
    trialstaff_end TEXT
);

CREATE INDEX IF NOT EXISTS idx_trialstaff_trial ON trialstaff(trial_id);
CREATE INDEX IF NOT EXISTS idx_trialstaff_user ON trialstaff(user_id);
";
