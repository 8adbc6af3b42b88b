use std::sync::Arc;
use teloxide::{dptree::deps, prelude::*};

use crate::{
    config::Config,
    database::Database,
    handlers::{generate_bot_commands, handle_callback_query, handle_message},
    intake::AdminIntake,
};

/// # Panics
///
/// Panics if the config is broken or the database can't be opened.
pub async fn entry() {
    let config = Config::from_env().expect("Could not load the config!");

    log::info!("Opening the database at {}...", config.database_url);
    let database = Arc::new(
        Database::new(&config.database_url)
            .await
            .expect("Failed to open the database!"),
    );

    let bot = Bot::new(&config.token);

    bot.set_my_commands(generate_bot_commands())
        .await
        .expect("Failed to set bot commands!");

    let config = Arc::new(config);
    let intake = Arc::new(AdminIntake::new());

    log::info!("Creating the handler...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback_query));

    log::info!("Dispatching the dispatcher!");

    Dispatcher::builder(bot, handler)
        .default_handler(|_| async {})
        .dependencies(deps![database, config, intake])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("it appears we have been bonked.");
}
