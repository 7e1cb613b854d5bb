use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::{MongoDaoError, MongoResult};

/// Startup ping attempts before the backend gives up.
const MAX_PING_ATTEMPTS: u32 = 10;
/// Delay before the first retry; doubled per attempt up to the cap.
const FIRST_RETRY_DELAY: Duration = Duration::from_millis(250);
const RETRY_DELAY_CAP: Duration = Duration::from_secs(5);

/// Build the client and block until the tournament database answers a ping.
///
/// The driver connects lazily, so constructing the client says nothing about
/// reachability; the bounded ping loop turns a dead database into a startup
/// error instead of a surprise on the first query.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut delay = FIRST_RETRY_DELAY;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => {
                debug!(database = database_name, attempt, "tournament database reachable");
                break;
            }
            Err(source) if attempt >= MAX_PING_ATTEMPTS => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                warn!(
                    database = database_name,
                    attempt,
                    error = %err,
                    "tournament database ping failed, retrying"
                );
                sleep(delay).await;
                delay = (delay * 2).min(RETRY_DELAY_CAP);
            }
        }
    }

    Ok((client, database))
}
