use std::fmt;

use super::chart::Sparkline;
use super::format::{Tone, LOADING_LABEL};
use super::projection::*;

const RULE_WIDTH: usize = 60;

fn rule(f: &mut fmt::Formatter<'_>, c: char) -> fmt::Result {
    writeln!(f, "{}", c.to_string().repeat(RULE_WIDTH))
}

fn section(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    rule(f, '-')?;
    writeln!(f, "{}", title.to_uppercase())
}

fn toned(tone: Tone, text: &str) -> String {
    format!("{} {}", tone.marker(), text)
}

fn chart(f: &mut fmt::Formatter<'_>, chart: &Sparkline) -> fmt::Result {
    writeln!(f, "  {}", chart.line)?;
    writeln!(
        f,
        "  min {:.2}  max {:.2}  senast {:.2}  ({} - {})",
        chart.min, chart.max, chart.last, chart.from, chart.to
    )
}

fn trade_lines(f: &mut fmt::Formatter<'_>, lines: &[TradeLine]) -> fmt::Result {
    for line in lines {
        writeln!(
            f,
            "  {:<6} {:<14} {:>12}",
            line.kind,
            line.amount,
            toned(line.tone, &line.pnl)
        )?;
    }
    Ok(())
}

impl fmt::Display for DashboardView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardView::Loading => writeln!(f, "{}", LOADING_LABEL),
            DashboardView::Error(message) => writeln!(f, "{}", message),
            DashboardView::Ready(screen) => write!(f, "{}", screen),
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        rule(f, '=')?;
        writeln!(f, "{:^width$}", self.header.title, width = RULE_WIDTH)?;
        writeln!(
            f,
            "[t] {}    [s] {}",
            self.header.toggle_label, self.header.settings_label
        )?;
        rule(f, '=')?;

        writeln!(f, "TRADING STATUS")?;
        writeln!(f, "  Status:               {}", toned(self.status.run_tone, self.status.run_state))?;
        writeln!(f, "  Senaste Uppdatering:  {}", self.status.last_update)?;
        if let Some(server) = &self.status.server_update {
            writeln!(f, "  Server:               {}", server)?;
        }
        writeln!(f, "  Aktiva Trades:        {}", self.status.active_trades)?;

        if let Some(price) = &self.price {
            section(f, "Live Pris")?;
            writeln!(f, "  Nuvarande Pris:       {}", price.current)?;
            writeln!(f, "  24h Förändring:       {}", toned(price.change_tone, &price.change))?;
            if let (Some(bid), Some(ask)) = (&price.bid, &price.ask) {
                writeln!(f, "  Bid / Ask:            {} / {}", bid, ask)?;
            }
            if let Some(volume) = &price.volume {
                writeln!(f, "  Volym:                {}", volume)?;
            }
            if let Some(error) = &price.error {
                writeln!(f, "  ! {}", error)?;
            }
            writeln!(f, "  Prisutveckling")?;
            match &price.chart {
                Some(c) => chart(f, c)?,
                None => writeln!(f, "  {}", LOADING_LABEL)?,
            }
            if let Some(error) = &price.history_error {
                writeln!(f, "  ! {}", error)?;
            }
        }

        if let Some(alerts) = &self.alerts {
            section(f, "Prisvarningar")?;
            writeln!(
                f,
                "  Ny varning: {} {}",
                alerts.side,
                if alerts.price_input.is_empty() { "-" } else { alerts.price_input.as_str() }
            )?;
            if let Some(error) = &alerts.error {
                writeln!(f, "  ! {}", error)?;
            }
            for notice in &alerts.notices {
                writeln!(f, "  * {}", notice)?;
            }
        }

        if let Some(metrics) = &self.metrics {
            section(f, "Resultat")?;
            writeln!(f, "  Totalt antal trades:  {}", metrics.total_trades)?;
            writeln!(f, "  Vinnande trades:      {}", metrics.winning_trades)?;
            writeln!(f, "  Förlorande trades:    {}", metrics.losing_trades)?;
            writeln!(f, "  Vinstandel:           {}", metrics.win_rate)?;
            writeln!(f, "  Total PnL:            {}", toned(metrics.pnl_tone, &metrics.total_pnl))?;
        }

        if let Some(pnl_chart) = &self.pnl_chart {
            section(f, "PnL Över Tid")?;
            match pnl_chart {
                Some(c) => chart(f, c)?,
                None => writeln!(f, "  -")?,
            }
        }

        if let Some(balance) = &self.balance {
            section(f, "Balans")?;
            for row in balance {
                match &row.free {
                    Some(free) => writeln!(
                        f,
                        "  {:<8} Total: {}, Tillgängligt: {}",
                        format!("{}:", row.currency),
                        row.total,
                        free
                    )?,
                    None => writeln!(f, "  {:<8} {}", format!("{}:", row.currency), row.total)?,
                }
            }
        }

        if let Some(active) = &self.active_orders {
            section(f, "Aktiva Ordrar")?;
            trade_lines(f, active)?;
        }

        if let Some(recent) = &self.recent_trades {
            section(f, "Senaste Trades")?;
            trade_lines(f, recent)?;
        }

        if let Some(table) = &self.trade_table {
            section(f, "Tradehistorik")?;
            match table {
                TradeTable::Empty(placeholder) => writeln!(f, "  {}", placeholder)?,
                TradeTable::Rows(rows) => {
                    writeln!(
                        f,
                        "  {:<19} {:<5} {:<10} {:>16} {:>12} {:>20} {:>10}",
                        "Datum", "Typ", "Symbol", "Pris", "Antal", "Fee", "PnL"
                    )?;
                    for row in rows {
                        writeln!(
                            f,
                            "  {:<19} {:<5} {:<10} {:>16} {:>12} {:>20} {:>10}",
                            row.date,
                            row.kind,
                            row.symbol,
                            row.price,
                            row.amount,
                            row.fee,
                            toned(row.tone, &row.pnl)
                        )?;
                    }
                }
            }
        }

        if let Some(trading) = &self.manual_trading {
            section(f, "Manuell Handel")?;
            writeln!(f, "  Typ:                  {}", trading.side)?;
            writeln!(
                f,
                "  Mängd:                {}",
                if trading.amount_input.is_empty() { "-" } else { trading.amount_input.as_str() }
            )?;
            writeln!(f, "  Snabbval:             {}", trading.quick_amounts.join("  "))?;
            writeln!(f, "  Beräknat värde:       {} USD", trading.estimated_value)?;
            if let Some(status) = &trading.status {
                writeln!(f, "  {}", toned(trading.status_tone, status))?;
            }
        }

        if let Some(settings) = &self.settings {
            section(f, "Bot Inställningar")?;
            if let Some(error) = &settings.error {
                writeln!(f, "  ! {}", error)?;
            }
            for field in &settings.fields {
                writeln!(f, "  {:<28} {}", format!("{}:", field.label), field.value)?;
            }
        }

        rule(f, '=')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DisplayModules;
    use crate::state::{DashboardData, StateUpdate};
    use crate::types::PriceTick;
    use chrono::Utc;
    use serde_json::json;

    fn render(data: &DashboardData) -> String {
        DashboardView::project(data, &DisplayModules::default()).to_string()
    }

    fn ready(report: serde_json::Value) -> DashboardData {
        let mut data = DashboardData::default();
        data.apply(StateUpdate::MetricsReceived {
            report: serde_json::from_value(report).unwrap(),
            at: Utc::now(),
        });
        data
    }

    #[test]
    fn test_loading_and_error_screens() {
        let mut data = DashboardData::default();
        assert_eq!(render(&data), "Laddar...\n");

        data.apply(StateUpdate::MetricsFailed("Kunde inte hämta data: HTTP error! status: 500".to_string()));
        assert_eq!(render(&data), "Kunde inte hämta data: HTTP error! status: 500\n");
    }

    #[test]
    fn test_running_dashboard() {
        let mut data = ready(json!({
            "metrics": {"total_trades": 4, "winning_trades": 3, "losing_trades": 1, "total_pnl": 25.5, "win_rate": 0.75},
            "balance": {"total": {"BTC": 0.5, "USDT": 1000}, "free": {"BTC": 0.25, "USDT": 800}},
            "is_running": true
        }));
        data.apply(StateUpdate::PriceReceived(PriceTick::new(100.0)));
        data.apply(StateUpdate::PriceReceived(PriceTick::new(110.0)));

        let out = render(&data);
        assert!(out.contains("Kör"));
        assert!(out.contains("[t] Stoppa Bot"));
        assert!(out.contains("110.00 USD"));
        assert!(out.contains("+10.00%"));
        assert!(out.contains("Vinstandel:           75.0%"));
        assert!(out.contains("BTC:     Total: 0.50000000, Tillgängligt: 0.25000000"));
        assert!(out.contains("Inga senaste trades att visa."));
        assert!(!out.contains("BOT INSTÄLLNINGAR"));
    }

    #[test]
    fn test_settings_never_render_secrets() {
        let mut data = ready(json!({}));
        data.apply(StateUpdate::SettingsReceived(
            serde_json::from_value(json!({"API_KEY": "abc123", "API_SECRET": "shh", "EMAIL_PASSWORD": "pw", "TIMEZONE": "Europe/Stockholm"}))
                .unwrap(),
        ));
        data.apply(StateUpdate::SettingsPanelToggled);

        let out = render(&data);
        assert!(out.contains("TIMEZONE:"));
        assert!(out.contains("Europe/Stockholm"));
        for secret in ["API_KEY", "API SECRET", "abc123", "shh", "EMAIL PASSWORD"] {
            assert!(!out.contains(secret), "{} leaked", secret);
        }
    }
}
