mod api;
mod auth;
mod config;

use crate::auth::{StaticTokenValidator, TokenValidator};
use crate::config::ApiConfig;
use rocket::fairing::AdHoc;
use rocket::figment::map;
use rocket::{Build, Rocket, figment, launch};
use rocket_sync_db_pools::database as sync_database;
use std::sync::Arc;
use tenso_core::{Clock, HandlerRegistry, build_routes};
use tenso_db::PgConnection;

#[sync_database("tenso")]
struct Db(PgConnection);

async fn run_migrations(rocket: Rocket<Build>) -> Rocket<Build> {
    tokio::task::spawn_blocking(|| {
        tenso_db::run_migrations().expect("Failed to apply migrations");
    })
    .await
    .expect("Error joining migrations task");

    rocket
}

fn get_figment_with_constructed_db_url() -> figment::Figment {
    let url = tenso_db::postgres_url_from_environment();
    rocket::Config::figment().merge(("databases", map!["tenso" => map!["url" => url]]))
}

#[launch]
fn rocket() -> _ {
    let config = ApiConfig::config().expect("API configuration is invalid");

    let registry = HandlerRegistry::builtin();
    let routes =
        Arc::new(build_routes(&config.routes, &registry).expect("route configuration is invalid"));
    let token_validator: Arc<dyn TokenValidator> = Arc::new(
        StaticTokenValidator::from_json(&config.auth_tokens)
            .expect("the configured principal table is invalid"),
    );

    rocket::custom(get_figment_with_constructed_db_url())
        .manage(routes)
        .manage(token_validator)
        .manage(Clock::system())
        .mount("/", rocket::routes![api::index])
        .mount("/v1/events", api::routes())
        .attach(Db::fairing())
        .attach(AdHoc::on_ignite("Migrations", run_migrations))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_db() {
        if std::env::var_os("POSTGRES_USER").is_none() {
            eprintln!("POSTGRES_USER is not set; skipping database-backed test");
            return;
        }

        let config = get_figment_with_constructed_db_url()
            .merge(("port", openport::pick_random_unused_port()))
            .merge(("databases", map!["tenso" => map!["pool_size" => 2]]));

        let rocket = rocket::custom(config)
            .attach(Db::fairing())
            .ignite()
            .await
            .expect("Rocket failed to ignite");

        let db = Db::get_one(&rocket)
            .await
            .expect("Failed to get a database connection");

        db.run(|_| ()).await;
    }
}
