use std::sync::Arc;

use modqueue_console::audit::DiscordAudit;
use modqueue_console::config::{BotConfig, CONFIG_FILE};
use modqueue_console::ledger::{Actor, Ledger, RuntimeConfig, TableFiles, runtime_config};
use modqueue_console::lookup::{PlatformUrls, RobloxClient};
use modqueue_console::moderation::{ModerationService, SWEEP_INTERVAL, Sweeper};
use modqueue_console::permissions::{Permissions, Rank, RankStore};
use modqueue_console::relay::HttpRelay;
use modqueue_console::{BOT_NAME, Data, Error, commands, handlers, logging};
use poise::serenity_prelude::{self as serenity};
use serenity::GatewayIntents;
use tracing::{error, info};

/// Load the persisted tables and wire every collaborator together
async fn build_service(config: &BotConfig) -> Result<Arc<ModerationService>, Error> {
    let files = Arc::new(TableFiles::new(&config.data_dir));
    let ledger = Arc::new(Ledger::load(Arc::clone(&files)).await?);
    let ranks = Arc::new(RankStore::load(Arc::clone(&files)).await?);
    let settings = Arc::new(RuntimeConfig::load(files).await?);

    if let Some(place_id) = &config.place_id {
        settings.seed(runtime_config::PLACE_ID, place_id.as_str()).await?;
    }
    if let Some(universe_id) = &config.universe_id {
        settings
            .seed(runtime_config::UNIVERSE_ID, universe_id.as_str())
            .await?;
    }
    if ranks
        .grant_if_absent(config.owner_id, Rank::Owner, Actor::System)
        .await?
    {
        info!(owner_id = config.owner_id, "Seeded bot owner into the staff list");
    }

    let relay = HttpRelay::new(
        &config.modqueue_url,
        config.modqueue_secret.clone(),
        config.http_timeout,
    )?;
    info!(endpoint = relay.endpoint(), "Modqueue relay configured");

    let directory = RobloxClient::new(
        PlatformUrls::default(),
        config.roblox_cookie.clone(),
        config.http_timeout,
    )?;
    let audit = DiscordAudit::new(
        Arc::new(serenity::Http::new(&config.discord_token)),
        config.logs_channel_id,
        config.owner_id,
    );

    let service = ModerationService::new(
        ledger,
        Arc::new(Permissions::new(config.owner_id, ranks)),
        settings,
        Arc::new(relay),
        Arc::new(directory),
        Arc::new(audit),
    )
    .with_group(config.group_id);
    Ok(Arc::new(service))
}

/// Main function to run the bot
async fn async_main() -> Result<(), Error> {
    logging::init()?;

    let config = BotConfig::load(CONFIG_FILE).await?;
    let moderation = build_service(&config).await?;
    let sweeper = Sweeper::start(Arc::clone(&moderation), SWEEP_INTERVAL);

    let token = config.discord_token.clone();
    let guild_id = config.guild_id;
    let data = Data::new(config, moderation);
    let framework_data = data.clone();

    // Configure the Poise framework
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::commands(),
            pre_command: |ctx| Box::pin(async move { logging::log_command_start(ctx).await }),
            post_command: |ctx| Box::pin(async move { logging::log_command_end(ctx).await }),
            on_error: |error| {
                Box::pin(async move {
                    logging::log_command_error(&error);
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                let commands = &framework.options().commands;
                match guild_id {
                    Some(id) => {
                        poise::builtins::register_in_guild(ctx, commands, serenity::GuildId::new(id))
                            .await?;
                        logging::log_console(&format!("Registered commands in guild {id}"));
                    }
                    None => {
                        poise::builtins::register_globally(ctx, commands).await?;
                        logging::log_console("Registered commands globally");
                    }
                }
                Ok(framework_data)
            })
        })
        .build();

    // Configure the Serenity client
    let intents = GatewayIntents::non_privileged();
    let mut client = serenity::ClientBuilder::new(token, intents)
        .event_handler(handlers::Handler::new())
        .framework(framework)
        .await?;
    client.data.write().await.insert::<Data>(data);

    let shard_manager = Arc::clone(&client.shard_manager);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            return;
        }
        info!("Shutting down");
        shard_manager.shutdown_all().await;
    });

    info!("Starting {BOT_NAME}...");
    let result = client.start().await;
    sweeper.shutdown().await;
    result?;

    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to build the runtime: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = runtime.block_on(async_main()) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
