//! Condenser API adapter shared by Hive, Steem and Blurt
//!
//! The three chains speak the same JSON-RPC dialect and the same binary
//! transaction format. [`GrapheneClient`] is parameterised by
//! [`Platform`] for the few values that differ: chain id, endpoint and
//! legacy asset symbols.

pub mod api;
pub mod error;
pub mod keys;
pub mod rpc;
pub mod serializer;

#[cfg(test)]
mod test_server;

pub use error::ClientError;
pub use keys::PrivateKey;
pub use rpc::RpcClient;
pub use serializer::{Operation, Transaction};

use api::{ApiAccount, ApiDiscussion, ApiGlobalProperties, ApiOperation};
use async_trait::async_trait;
use curator_core::{
    Account, Asset, Comment, Credential, CuratorError, GlobalProperties, KeyRole, LedgerAdapter,
    Platform, PlatformConfig, Post, Transfer, VestingDelegation,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, info};

type Result<T, E = CuratorError> = std::result::Result<T, E>;

pub struct GrapheneClient {
    platform: Platform,
    rpc: RpcClient,
    keys: HashMap<(String, KeyRole), PrivateKey>,
}

impl GrapheneClient {
    pub fn new(platform: Platform, rpc_url: impl Into<String>) -> Result<Self, ClientError> {
        Ok(Self {
            platform,
            rpc: RpcClient::new(rpc_url)?,
            keys: HashMap::new(),
        })
    }

    /// Resolve and cache the signing key for each credential
    pub fn with_credentials<'a>(
        mut self,
        credentials: impl IntoIterator<Item = &'a Credential>,
    ) -> Result<Self, ClientError> {
        for credential in credentials {
            let key = PrivateKey::resolve(credential)?;
            self.keys
                .insert((credential.account.clone(), credential.role), key);
        }
        Ok(self)
    }

    /// Client for one configured platform with both roles' keys derived up front
    pub fn connect(
        platform: Platform,
        section: &PlatformConfig,
        rpc_url: &str,
    ) -> Result<Self, ClientError> {
        let client = Self::new(platform, rpc_url)?
            .with_credentials([&section.posting_credential(), &section.active_credential()])?;
        info!(
            platform = %platform,
            account = %section.username,
            rpc_url = %rpc_url,
            "Ledger client ready"
        );
        Ok(client)
    }

    fn key_for(&self, credential: &Credential) -> Result<&PrivateKey, ClientError> {
        self.keys
            .get(&(credential.account.clone(), credential.role))
            .ok_or_else(|| {
                ClientError::Key(format!(
                    "no {} key loaded for {}",
                    credential.role, credential.account
                ))
            })
    }

    async fn global_properties(&self) -> Result<GlobalProperties, ClientError> {
        let api: ApiGlobalProperties = self
            .rpc
            .call("get_dynamic_global_properties", json!([]))
            .await?;
        GlobalProperties::try_from(api)
    }

    async fn broadcast(&self, credential: &Credential, operation: Operation) -> Result<(), ClientError> {
        let key = self.key_for(credential)?;
        let props = self.global_properties().await?;
        let name = operation.name();
        let tx = Transaction::from_props(self.platform, &props, vec![operation])?;
        let signature = key.sign_digest(&tx.digest()?)?;

        let _: Value = self
            .rpc
            .call("broadcast_transaction", json!([tx.to_json(&[signature])]))
            .await?;
        debug!(
            platform = %self.platform,
            account = %credential.account,
            operation = name,
            ref_block = tx.ref_block_num,
            "Transaction broadcast"
        );
        Ok(())
    }
}

#[async_trait]
impl LedgerAdapter for GrapheneClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn fetch_account(&self, name: &str) -> Result<Account> {
        let accounts: Vec<ApiAccount> = self.rpc.call("get_accounts", json!([[name]])).await?;
        accounts
            .into_iter()
            .next()
            .map(Account::from)
            .ok_or_else(|| CuratorError::NotFound(format!("{} account {name}", self.platform)))
    }

    async fn fetch_vesting_delegations(
        &self,
        delegator: &str,
        start_after: &str,
        limit: u32,
    ) -> Result<Vec<VestingDelegation>> {
        Ok(self
            .rpc
            .call("get_vesting_delegations", json!([delegator, start_after, limit]))
            .await?)
    }

    async fn fetch_recent_tagged_posts(&self, tag: &str, limit: u32) -> Result<Vec<Post>> {
        let posts: Vec<ApiDiscussion> = self
            .rpc
            .call("get_discussions_by_created", json!([{ "tag": tag, "limit": limit }]))
            .await?;
        Ok(posts.into_iter().map(Post::from).collect())
    }

    async fn fetch_post_content(&self, author: &str, permlink: &str) -> Result<Post> {
        let post: ApiDiscussion = self.rpc.call("get_content", json!([author, permlink])).await?;
        if post.author.is_empty() {
            return Err(CuratorError::NotFound(format!(
                "{} post @{author}/{permlink}",
                self.platform
            )));
        }
        Ok(post.into())
    }

    async fn fetch_global_properties(&self) -> Result<GlobalProperties> {
        Ok(self.global_properties().await?)
    }

    async fn fetch_transfers_in_block(&self, block_num: u64) -> Result<Vec<Transfer>> {
        let ops: Vec<ApiOperation> = self
            .rpc
            .call("get_ops_in_block", json!([block_num, false]))
            .await?;
        let mut transfers = Vec::new();
        for op in ops {
            if let Some(transfer) = op.into_transfer(block_num)? {
                transfers.push(transfer);
            }
        }
        Ok(transfers)
    }

    async fn broadcast_vote(
        &self,
        credential: &Credential,
        voter: &str,
        author: &str,
        permlink: &str,
        weight: u16,
    ) -> Result<()> {
        let weight = i16::try_from(weight)
            .map_err(|_| CuratorError::Validation(format!("vote weight {weight} out of range")))?;
        let op = Operation::Vote {
            voter: voter.to_string(),
            author: author.to_string(),
            permlink: permlink.to_string(),
            weight,
        };
        Ok(self.broadcast(credential, op).await?)
    }

    async fn broadcast_comment(&self, credential: &Credential, comment: &Comment) -> Result<()> {
        Ok(self
            .broadcast(credential, Operation::Comment(comment.clone()))
            .await?)
    }

    async fn broadcast_transfer_to_vesting(
        &self,
        credential: &Credential,
        from: &str,
        to: &str,
        amount: &Asset,
    ) -> Result<()> {
        let op = Operation::TransferToVesting {
            from: from.to_string(),
            to: to.to_string(),
            amount: amount.clone(),
        };
        Ok(self.broadcast(credential, op).await?)
    }
}
