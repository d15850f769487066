use portal_api_client::{ApiClient, EnvConfig, RequestConfig};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct Lead {
    id: u64,
    name: String,
}

#[derive(Serialize)]
struct NewLead<'a> {
    name: &'a str,
    email: &'a str,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = EnvConfig::from_env()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.log_level))
        .init();

    let client = ApiClient::builder()
        .options(config.client_options())
        .build();

    if let Ok(token) = std::env::var("API_TOKEN") {
        client.set_auth_token(&token, true);
    }

    let created: Lead = client
        .post(
            "/leads",
            &NewLead {
                name: "Acme Corp",
                email: "sales@acme.test",
            },
            None,
        )
        .await?;
    println!("created lead {} ({})", created.id, created.name);

    let leads: Vec<Lead> = client
        .get("/leads", Some(RequestConfig::new().param("page", 1)))
        .await?;
    for lead in leads {
        println!("{lead:?}");
    }

    Ok(())
}
