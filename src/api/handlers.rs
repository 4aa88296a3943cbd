use actix_web::{web, HttpResponse, Responder};
use log::error;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;

use crate::blockchain::{Account, Block, Blockchain, TransactionRecord};

/// Data structure for the blockchain state
pub type BlockchainData = web::Data<Blockchain>;

/// Cancelled when the server shuts down; stops in-flight mining
pub type ShutdownToken = web::Data<CancellationToken>;

/// Response for the chain endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ChainResponse {
    /// The blocks in the chain
    pub chain: Vec<Block>,

    /// The length of the chain
    pub length: usize,
}

/// Request for the register endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterRequest {
    /// The new account's identifier
    pub username: String,
}

/// Response for the register endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,

    /// The newly created account
    pub account: Account,
}

/// Request for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    /// The sender's username
    pub sender: String,

    /// The receiver's username
    pub receiver: String,

    /// The amount to transfer
    pub amount: u64,
}

/// Response for the transaction endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub message: String,

    /// The record queued for the next block
    pub transaction: TransactionRecord,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub message: String,

    /// The newly mined block
    pub block: Block,
}

/// Response for the validate endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    /// Whether the chain is valid
    pub valid: bool,

    /// Why validation failed, if it did
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Get the full blockchain
#[utoipa::path(
    get,
    path = "/api/v1/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainResponse)
    )
)]
pub async fn get_chain(blockchain: BlockchainData) -> impl Responder {
    let chain = blockchain.get_chain();

    HttpResponse::Ok().json(ChainResponse {
        length: chain.len(),
        chain,
    })
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/api/v1/transactions/pending",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = Vec<TransactionRecord>)
    )
)]
pub async fn get_pending_transactions(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.pending_transactions())
}

/// Create a new transaction
///
/// Moves the funds right away and queues the transaction for the next block
#[utoipa::path(
    post,
    path = "/api/v1/transactions/new",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction accepted", body = TransactionResponse),
        (status = 400, description = "Unknown account, invalid amount or insufficient funds")
    )
)]
pub async fn new_transaction(
    blockchain: BlockchainData,
    transaction_req: web::Json<TransactionRequest>,
) -> impl Responder {
    match blockchain.submit_transaction(
        &transaction_req.sender,
        &transaction_req.receiver,
        transaction_req.amount,
    ) {
        Ok(transaction) => HttpResponse::Created().json(TransactionResponse {
            message: "Transaction will be added to Block".to_string(),
            transaction,
        }),
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": format!("Transaction failed: {}", err)
        })),
    }
}

/// Mine a new block
///
/// Seals all pending transactions into a new block
#[utoipa::path(
    post,
    path = "/api/v1/mine",
    responses(
        (status = 200, description = "Block mined successfully", body = MineResponse),
        (status = 503, description = "Server is shutting down"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine_block(blockchain: BlockchainData, shutdown: ShutdownToken) -> impl Responder {
    let miner = blockchain.clone();
    let token = shutdown.get_ref().clone();

    // The proof-of-work search is CPU bound; keep it off the async workers.
    match web::block(move || miner.mine_block_until(&token)).await {
        Ok(Ok(Some(block))) => HttpResponse::Ok().json(MineResponse {
            message: "Congratulations, you just mined a block!".to_string(),
            block,
        }),
        Ok(Ok(None)) => HttpResponse::ServiceUnavailable().json(serde_json::json!({
            "error": "Mining cancelled: server is shutting down"
        })),
        Ok(Err(err)) => {
            error!("Failed to mine block: {}", err);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Failed to mine block: {}", err)
            }))
        }
        Err(err) => {
            error!("Mining task failed: {}", err);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": format!("Mining task failed: {}", err)
            }))
        }
    }
}

/// Check if the blockchain is valid
#[utoipa::path(
    get,
    path = "/api/v1/validate",
    responses(
        (status = 200, description = "Blockchain validation status", body = ValidationResponse)
    )
)]
pub async fn validate_chain(blockchain: BlockchainData) -> impl Responder {
    let response = match blockchain.validate() {
        Ok(()) => ValidationResponse {
            valid: true,
            error: None,
        },
        Err(err) => ValidationResponse {
            valid: false,
            error: Some(err.to_string()),
        },
    };

    HttpResponse::Ok().json(response)
}

/// Register a new account
///
/// New accounts start with the configured starting balance. Surrounding
/// whitespace is trimmed from the username, so `" A "` registers `"A"`.
#[utoipa::path(
    post,
    path = "/api/v1/accounts",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created successfully", body = RegisterResponse),
        (status = 400, description = "Missing or duplicate username")
    )
)]
pub async fn register_account(
    blockchain: BlockchainData,
    register_req: web::Json<RegisterRequest>,
) -> impl Responder {
    let username = register_req.username.trim();
    if username.is_empty() {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "Username is required"
        }));
    }

    match blockchain.register_account(username) {
        Ok(account) => HttpResponse::Created().json(RegisterResponse {
            message: format!("User {} created successfully", username),
            account,
        }),
        Err(err) => HttpResponse::BadRequest().json(serde_json::json!({
            "error": err.to_string()
        })),
    }
}

/// Get all accounts
#[utoipa::path(
    get,
    path = "/api/v1/accounts",
    responses(
        (status = 200, description = "Accounts retrieved successfully", body = Vec<Account>)
    )
)]
pub async fn get_all_accounts(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.accounts())
}

/// Get a single account
#[utoipa::path(
    get,
    path = "/api/v1/accounts/{username}",
    responses(
        (status = 200, description = "Account retrieved successfully", body = Account),
        (status = 404, description = "Account not found")
    )
)]
pub async fn get_account(
    blockchain: BlockchainData,
    username: web::Path<String>,
) -> impl Responder {
    match blockchain.account(&username) {
        Some(account) => HttpResponse::Ok().json(account),
        None => HttpResponse::NotFound().json(serde_json::json!({
            "error": format!("Account not found: {}", username.as_str())
        })),
    }
}
