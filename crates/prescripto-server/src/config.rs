//! Command line and environment configuration.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use prescripto_core::Role;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "prescripto", version, about = "Prescription and test-result records service")]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// SQLite database file
    #[arg(long, env = "PRESCRIPTO_DB", default_value = "prescripto.db", global = true)]
    pub database: PathBuf,

    /// Directory uploaded reports and images are written to
    #[arg(long, env = "PRESCRIPTO_UPLOAD_DIR", default_value = "uploads", global = true)]
    pub upload_dir: PathBuf,

    /// URL prefix attachments are served under [default: http://<bind>/files]
    #[arg(long, env = "PRESCRIPTO_PUBLIC_URL", global = true)]
    pub public_url: Option<String>,

    /// Secret used to sign and verify bearer tokens
    #[arg(long, env = "PRESCRIPTO_TOKEN_SECRET", hide_env_values = true, global = true)]
    pub token_secret: Option<String>,

    /// Lifetime of issued tokens, at most one year
    #[arg(
        long,
        env = "PRESCRIPTO_TOKEN_TTL_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_HOURS),
        global = true
    )]
    pub token_ttl_hours: i64,

    /// Largest test-result request body (report plus images), in MiB
    #[arg(
        long,
        env = "PRESCRIPTO_MAX_UPLOAD_MB",
        default_value_t = 25,
        value_parser = clap::value_parser!(u64).range(1..=MAX_UPLOAD_MB),
        global = true
    )]
    pub max_upload_mb: u64,
}

pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 366;
pub const MAX_UPLOAD_MB: u64 = 1024;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, env = "PRESCRIPTO_BIND", default_value = "127.0.0.1:4000")]
        bind: SocketAddr,
    },

    /// Register a patient and print it as JSON
    AddPatient {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        /// Date of birth, YYYY-MM-DD
        #[arg(long)]
        dob: Option<NaiveDate>,
    },

    /// Register a doctor and print it as JSON
    AddDoctor {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        specialization: String,
        #[arg(long)]
        phone: Option<String>,
    },

    /// Record a booked appointment and print it as JSON
    AddAppointment {
        #[arg(long)]
        patient_id: String,
        #[arg(long)]
        doctor_id: String,
        /// e.g. 14_6_2024
        #[arg(long)]
        slot_date: String,
        /// e.g. "10:30 AM"
        #[arg(long)]
        slot_time: String,
    },

    /// Print a bearer token for a subject
    IssueToken {
        #[arg(long)]
        subject: String,
        #[arg(long, value_enum)]
        role: RoleArg,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum RoleArg {
    Patient,
    Doctor,
    Admin,
}

impl From<RoleArg> for Role {
    fn from(role: RoleArg) -> Self {
        match role {
            RoleArg::Patient => Role::Patient,
            RoleArg::Doctor => Role::Doctor,
            RoleArg::Admin => Role::Admin,
        }
    }
}

impl Settings {
    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_mb as usize) * 1024 * 1024
    }

    pub fn public_url(&self, bind: Option<SocketAddr>) -> String {
        match (&self.public_url, bind) {
            (Some(url), _) => url.clone(),
            (None, Some(addr)) => format!("http://{}/files", addr),
            (None, None) => "http://127.0.0.1:4000/files".to_string(),
        }
    }
}
