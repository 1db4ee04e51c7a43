//! Offline walkthrough against the simulated backend.
//!
//! ```text
//! LIFELINE_MOCK_API=true RUST_LOG=lifeline=debug cargo run --example walkthrough
//! ```

use lifeline::{IdentityFacts, Lifeline, LifelineConfig, LifelineError, NewContact, RequestOrigin, Route};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), LifelineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let lifeline = Lifeline::new(LifelineConfig::from_env()?)?;
    let revalidation = lifeline.start_revalidation();

    let seeded = lifeline.reset_simulation()?;
    println!("seeded test user {}", seeded.full_name);

    let facts = IdentityFacts::new(&seeded.full_name, &seeded.date_of_birth, &seeded.phone_number);
    let response = lifeline.auth().login(&facts).await?;
    println!("logged in, token expires in {:?}s", response.expires_in);

    for (name, phone) in [("Mom", "+15550001111"), ("Dad", "+15550002222")] {
        let contact = lifeline.contacts().add(&NewContact::new(name, phone)).await?;
        println!("added {} ({})", contact.name, contact.id);
    }
    println!("{} slots left", lifeline.contacts().book().remaining());

    let unknown = IdentityFacts::new("Nobody", "1970-01-01", "+19990000000");
    if let Err(err) = lifeline.auth().login(&unknown).await {
        let resolution = lifeline.resolve_error(&err, Route::Login, RequestOrigin::Auth);
        println!("login refused: {}", resolution.message);
    }

    println!("auth state: {:?}", lifeline.auth_state());
    revalidation.stop().await;
    Ok(())
}
