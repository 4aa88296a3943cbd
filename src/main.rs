use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use log::{error, info};
use tokio_util::sync::CancellationToken;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use vault_chain::api;
use vault_chain::blockchain::{self, AccountLedger, Blockchain, CreditPrinter};
use vault_chain::config::Settings;

// Build the ledger service and its background credit printer
fn initialize_blockchain(settings: &Settings) -> anyhow::Result<(Blockchain, CreditPrinter)> {
    let ledger = Arc::new(AccountLedger::with_starting_balance(
        settings.ledger.starting_balance,
    ));
    let blockchain =
        Blockchain::with_ledger(Arc::clone(&ledger)).with_parallel_mining(settings.mining.parallel);

    let printer = CreditPrinter::new(
        ledger,
        settings.printer.account.clone(),
        settings.printer.amount,
        settings.printer.interval(),
    );
    let balance = printer.provision(settings.printer.bonus)?;
    info!("Printer account {} holds {}", printer.account(), balance);

    Ok((blockchain, printer))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_pending_transactions,
        api::handlers::new_transaction,
        api::handlers::mine_block,
        api::handlers::validate_chain,
        api::handlers::register_account,
        api::handlers::get_all_accounts,
        api::handlers::get_account
    ),
    components(
        schemas(
            blockchain::Account,
            blockchain::Block,
            blockchain::TransactionRecord,
            api::handlers::ChainResponse,
            api::handlers::RegisterRequest,
            api::handlers::RegisterResponse,
            api::handlers::TransactionRequest,
            api::handlers::TransactionResponse,
            api::handlers::MineResponse,
            api::handlers::ValidationResponse
        )
    ),
    tags(
        (name = "blockchain", description = "Blockchain API endpoints")
    ),
    info(
        title = "Vault Chain API",
        version = "0.1.0",
        description = "A single-node proof-of-work ledger",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let settings = Settings::load()?;
    let (blockchain, printer) = initialize_blockchain(&settings)?;
    let blockchain = web::Data::new(blockchain);

    let shutdown = CancellationToken::new();
    let shutdown_data = web::Data::new(shutdown.clone());
    let printer_task = tokio::spawn(printer.run(shutdown.clone()));

    let (host, port) = settings.bind_address();
    info!("Starting HTTP server at http://{}:{}", host, port);

    let server = HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(blockchain.clone())
            .app_data(shutdown_data.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .disable_signals()
    .bind((host.as_str(), port))?
    .run();

    // Cancel the printer and any in-flight mining before stopping the server
    let handle = server.handle();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", err);
            return;
        }
        info!("Shutdown signal received");
        signal_token.cancel();
        handle.stop(true).await;
    });

    server.await?;
    shutdown.cancel();
    printer_task.await?;

    info!("Done");
    Ok(())
}
