//! token 命令 - 查看、注册、删除设备 token

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use super::output::format_output;
use crate::config::PushLogConfig;
use crate::registration::TokenService;
use crate::storage::KeyValueStore;
use crate::transport::LoopbackMessaging;

/// token 命令参数
#[derive(Args, Debug)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommand,

    /// 输出 JSON 格式
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// 显示保存的 token
    Show,
    /// 请求权限并通过回环消息服务获取新 token
    Register,
    /// 删除 token
    Delete,
}

#[derive(Debug, Serialize)]
struct TokenOutput {
    token: Option<String>,
}

/// 处理 token 命令
pub async fn handle_token<S: KeyValueStore>(
    store: Arc<S>,
    config: &PushLogConfig,
    args: TokenArgs,
) -> Result<()> {
    let transport = Arc::new(LoopbackMessaging::new(config.platform));
    let service = TokenService::new(transport, store, config.platform);

    let token = match args.command {
        TokenCommand::Show => service.tokens().current().await?,
        TokenCommand::Register => {
            service.register_device().await?;
            service.request_user_permission(config.permissions).await?
        }
        TokenCommand::Delete => {
            service.delete_token().await?;
            None
        }
    };

    if args.json {
        println!("{}", format_output(&TokenOutput { token }));
    } else {
        match token {
            Some(token) => println!("{}", token),
            None => println!("(no token)"),
        }
    }
    Ok(())
}
