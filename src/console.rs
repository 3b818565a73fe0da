use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::DisplayModules;
use crate::engine::{CommandDispatcher, Poller};
use crate::state::{DashboardStore, StateUpdate, QUICK_AMOUNTS};
use crate::types::{AlertSide, TradeSide};
use crate::view::DashboardView;

pub const HELP: &str = "\
Kommandon:
  toggle                  starta/stoppa boten
  buy|sell [mängd]        välj typ (och mängd) och lägg trade
  side buy|sell           välj typ
  amount <mängd>          ange mängd
  quick <1-4>             snabbval 0.001 / 0.01 / 0.1 / 1
  trade                   lägg trade med formulärets värden
  alert above|below <pris>  lägg till prisvarning
  alert-side above|below  välj varningstyp
  alert-price <pris>      ange varningspris
  alert                   skicka varningsformuläret
  settings                visa/dölj inställningar
  set KEY VALUE           ändra inställning
  save                    spara inställningar
  refresh                 hämta allt på nytt
  help                    visa denna hjälp
  quit                    avsluta";

#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("unknown command: {0} (try 'help')")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
}

/// One line typed into the watch console.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    Toggle,
    Trade {
        side: Option<TradeSide>,
        amount: Option<String>,
    },
    SelectSide(TradeSide),
    EnterAmount(String),
    QuickAmount(usize),
    Alert {
        side: Option<AlertSide>,
        price: Option<String>,
    },
    SelectAlertSide(AlertSide),
    EnterAlertPrice(String),
    ToggleSettings,
    Set {
        key: String,
        value: String,
    },
    Save,
    Refresh,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Ok(None);
        };
        let rest: Vec<&str> = words.collect();

        let command = match head.to_lowercase().as_str() {
            "toggle" | "t" => ConsoleCommand::Toggle,
            "buy" | "sell" | "köp" | "sälj" => ConsoleCommand::Trade {
                side: TradeSide::from_str(head),
                amount: rest.first().map(|a| a.to_string()),
            },
            "trade" => ConsoleCommand::Trade { side: None, amount: None },
            "side" => match rest.first().and_then(|s| TradeSide::from_str(s)) {
                Some(side) => ConsoleCommand::SelectSide(side),
                None => return Err(CommandError::Usage("side buy|sell")),
            },
            "amount" => match rest.first() {
                Some(amount) => ConsoleCommand::EnterAmount(amount.to_string()),
                None => return Err(CommandError::Usage("amount <mängd>")),
            },
            "quick" => match rest.first().and_then(|n| n.parse::<usize>().ok()) {
                Some(n) if (1..=QUICK_AMOUNTS.len()).contains(&n) => ConsoleCommand::QuickAmount(n - 1),
                _ => return Err(CommandError::Usage("quick <1-4>")),
            },
            "alert" => match rest.as_slice() {
                [] => ConsoleCommand::Alert { side: None, price: None },
                [side, price] => match AlertSide::from_str(side) {
                    Some(side) => ConsoleCommand::Alert {
                        side: Some(side),
                        price: Some(price.to_string()),
                    },
                    None => return Err(CommandError::Usage("alert above|below <pris>")),
                },
                _ => return Err(CommandError::Usage("alert above|below <pris>")),
            },
            "alert-side" => match rest.first().and_then(|s| AlertSide::from_str(s)) {
                Some(side) => ConsoleCommand::SelectAlertSide(side),
                None => return Err(CommandError::Usage("alert-side above|below")),
            },
            "alert-price" => match rest.first() {
                Some(price) => ConsoleCommand::EnterAlertPrice(price.to_string()),
                None => return Err(CommandError::Usage("alert-price <pris>")),
            },
            "settings" | "s" => ConsoleCommand::ToggleSettings,
            "set" => match rest.as_slice() {
                [key, value @ ..] => ConsoleCommand::Set {
                    key: key.to_uppercase(),
                    value: value.join(" "),
                },
                [] => return Err(CommandError::Usage("set KEY VALUE")),
            },
            "save" => ConsoleCommand::Save,
            "refresh" | "r" => ConsoleCommand::Refresh,
            "help" | "h" | "?" => ConsoleCommand::Help,
            "quit" | "q" | "exit" => ConsoleCommand::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(command))
    }
}

/// Runs console commands against the live dashboard.
#[derive(Clone)]
pub struct Console {
    store: DashboardStore,
    poller: Arc<Poller>,
    dispatcher: Arc<CommandDispatcher>,
    modules: DisplayModules,
}

impl Console {
    pub fn new(
        store: DashboardStore,
        poller: Arc<Poller>,
        dispatcher: Arc<CommandDispatcher>,
        modules: DisplayModules,
    ) -> Self {
        Self {
            store,
            poller,
            dispatcher,
            modules,
        }
    }

    /// The current screen as text.
    pub async fn screen(&self) -> String {
        let modules = self.modules;
        self.store
            .read(|data| DashboardView::project(data, &modules).to_string())
            .await
    }

    pub async fn execute(&self, command: ConsoleCommand) {
        debug!("Console command: {:?}", command);
        match command {
            ConsoleCommand::Toggle => {
                let _ = self.dispatcher.toggle_current().await;
            }
            ConsoleCommand::Trade { side, amount } => {
                if let Some(side) = side {
                    self.store.apply(StateUpdate::TradeSideSelected(side)).await;
                }
                if let Some(amount) = amount {
                    self.store.apply(StateUpdate::TradeAmountEntered(amount)).await;
                }
                let _ = self.dispatcher.submit_trade_form().await;
            }
            ConsoleCommand::SelectSide(side) => {
                self.store.apply(StateUpdate::TradeSideSelected(side)).await;
            }
            ConsoleCommand::EnterAmount(amount) => {
                self.store.apply(StateUpdate::TradeAmountEntered(amount)).await;
            }
            ConsoleCommand::QuickAmount(index) => {
                self.store.apply(StateUpdate::QuickAmountPicked(index)).await;
            }
            ConsoleCommand::Alert { side, price } => {
                if let Some(side) = side {
                    self.store.apply(StateUpdate::AlertSideSelected(side)).await;
                }
                if let Some(price) = price {
                    self.store.apply(StateUpdate::AlertPriceEntered(price)).await;
                }
                let _ = self.dispatcher.submit_alert_form().await;
            }
            ConsoleCommand::SelectAlertSide(side) => {
                self.store.apply(StateUpdate::AlertSideSelected(side)).await;
            }
            ConsoleCommand::EnterAlertPrice(price) => {
                self.store.apply(StateUpdate::AlertPriceEntered(price)).await;
            }
            ConsoleCommand::ToggleSettings => {
                self.store.apply(StateUpdate::SettingsPanelToggled).await;
            }
            ConsoleCommand::Set { key, value } => match self.store.edit_setting(&key, &value).await {
                Ok(()) => info!("{} = {}", key, value),
                Err(e) => warn!("{}", e),
            },
            ConsoleCommand::Save => {
                let _ = self.dispatcher.save_current_settings().await;
            }
            ConsoleCommand::Refresh => {
                tokio::join!(
                    self.poller.fetch_price(),
                    self.poller.fetch_price_history(),
                    self.poller.fetch_metrics(),
                    self.poller.fetch_settings(),
                );
            }
            ConsoleCommand::Help | ConsoleCommand::Quit => {}
        }
    }
}
