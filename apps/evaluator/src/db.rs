use anyhow::{Context, Result};
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use crate::models::{Rubric, RubricCriterion};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Creates a PostgreSQL connection pool and applies pending migrations.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    MIGRATOR
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// A job spec inserted on first start.
pub struct SeedJobSpec {
    pub title: &'static str,
    pub description: &'static str,
    pub rubric: Rubric,
}

pub fn default_job_specs() -> Vec<SeedJobSpec> {
    let criterion = |weight: u32, criteria: &str| RubricCriterion {
        weight,
        criteria: criteria.to_string(),
    };

    let mut backend = Rubric::new();
    backend.insert(
        "experience".to_string(),
        criterion(
            25,
            "Years of backend development, project complexity, system scaling experience",
        ),
    );
    backend.insert(
        "achievements".to_string(),
        criterion(
            20,
            "Impactful projects, performance improvements, AI feature implementations",
        ),
    );
    backend.insert(
        "cultural_fit".to_string(),
        criterion(
            15,
            "Communication, learning attitude, remote work capability",
        ),
    );
    backend.insert(
        "technical_skills".to_string(),
        criterion(
            40,
            "Backend languages (Go, PHP), databases (MySQL), message queues (RabbitMQ), \
             API design, AI integration",
        ),
    );

    vec![
        SeedJobSpec {
            title: "Test Job",
            description: "Backend evaluation system with AI",
            rubric: Rubric::new(),
        },
        SeedJobSpec {
            title: "Test Job",
            description: "Product Engineer (Backend) with focus on Go, PHP, MySQL, RabbitMQ, \
                          AI/LLM integration, and building scalable backend systems. Experience \
                          with RESTful APIs, database management, cloud technologies, and \
                          AI-powered features is required.",
            rubric: backend,
        },
    ]
}

/// Inserts the default job specs when the table is empty. Returns how many were inserted.
pub async fn seed_job_specs(pool: &PgPool) -> Result<usize> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM job_specs")
        .fetch_one(pool)
        .await
        .context("Failed to count job specs")?;

    if count > 0 {
        return Ok(0);
    }

    let specs = default_job_specs();
    let mut tx = pool.begin().await?;
    for spec in &specs {
        sqlx::query("INSERT INTO job_specs (title, description, rubric) VALUES ($1, $2, $3)")
            .bind(spec.title)
            .bind(spec.description)
            .bind(Json(spec.rubric.clone()))
            .execute(&mut *tx)
            .await
            .context("Failed to seed job spec")?;
    }
    tx.commit().await?;

    info!(count = specs.len(), "Seeded default job specs");
    Ok(specs.len())
}
