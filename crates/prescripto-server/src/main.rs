use anyhow::{Context, Result};
use chrono::Duration;
use clap::Parser;
use prescripto_core::models::{Appointment, Doctor, Patient};
use prescripto_core::{Database, LocalObjectStore, RecordService, SystemClock, TokenSigner};
use prescripto_server::config::{Cli, Command, Settings};
use prescripto_server::{router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let settings = cli.settings;

    match cli.command {
        Command::Serve { bind } => serve(&settings, bind).await,
        Command::AddPatient {
            name,
            email,
            phone,
            gender,
            dob,
        } => {
            let mut patient = Patient::new(name, email);
            patient.phone = phone;
            if let Some(gender) = gender {
                patient.gender = gender;
            }
            patient.date_of_birth = dob;
            let patient = open_service(&settings, None)?.register_patient(patient)?;
            print_json(&patient)
        }
        Command::AddDoctor {
            name,
            email,
            specialization,
            phone,
        } => {
            let mut doctor = Doctor::new(name, email, specialization);
            doctor.phone = phone;
            let doctor = open_service(&settings, None)?.register_doctor(doctor)?;
            print_json(&doctor)
        }
        Command::AddAppointment {
            patient_id,
            doctor_id,
            slot_date,
            slot_time,
        } => {
            let appointment = Appointment::new(patient_id, doctor_id, slot_date, slot_time);
            let appointment = open_service(&settings, None)?.book_appointment(appointment)?;
            print_json(&appointment)
        }
        Command::IssueToken { subject, role } => {
            let signer = signer(&settings)?;
            let ttl = Duration::try_hours(settings.token_ttl_hours).context("token TTL out of range")?;
            let token = signer.issue(&subject, role.into(), chrono::Utc::now(), ttl);
            println!("{}", token);
            Ok(())
        }
    }
}

async fn serve(settings: &Settings, bind: SocketAddr) -> Result<()> {
    let service = open_service(settings, Some(bind))?;
    let state = Arc::new(
        AppState::new(service, signer(settings)?, &settings.upload_dir)
            .with_max_upload_bytes(settings.max_upload_bytes()),
    );
    let app = router(state);

    let listener = TcpListener::bind(bind)
        .await
        .context("failed to bind TCP listener")?;
    info!(
        %bind,
        database = %settings.database.display(),
        max_upload_mb = settings.max_upload_mb,
        "Prescripto listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shut down");
    Ok(())
}

fn open_service(settings: &Settings, bind: Option<SocketAddr>) -> Result<RecordService> {
    let db = Database::open(&settings.database)
        .with_context(|| format!("failed to open database {}", settings.database.display()))?;
    let store = LocalObjectStore::new(&settings.upload_dir, settings.public_url(bind));
    Ok(RecordService::new(db, Arc::new(store), Arc::new(SystemClock)))
}

fn signer(settings: &Settings) -> Result<TokenSigner> {
    let secret = settings
        .token_secret
        .as_deref()
        .filter(|s| !s.is_empty())
        .context("PRESCRIPTO_TOKEN_SECRET (or --token-secret) must be set")?;
    Ok(TokenSigner::new(secret))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("Shutdown signal received");
}
