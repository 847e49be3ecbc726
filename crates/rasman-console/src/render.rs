//! Plain-text rendering of controller state for the terminal.

use std::fmt::Write;

use rasman_shared::format::network_label;
use rasman_shared::SuspendedStatus;

use crate::controllers::{
    ComposeStatus, DashboardSnapshot, MessageComposer, SessionSource, Stat, StatValue,
    UserDetailsSnapshot,
};
use crate::list::{Banner, BannerStyle, ListBody, ListView, Tint};

pub fn banner(banner: &Banner) -> String {
    let tag = match banner.style {
        BannerStyle::Success => "ok",
        BannerStyle::Warning => "warn",
        BannerStyle::Danger => "error",
    };
    format!("[{tag}] {}", banner.text)
}

fn tint_marker(tint: Tint) -> char {
    match tint {
        Tint::Neutral => ' ',
        Tint::Primary => '*',
        Tint::Secondary => '-',
        Tint::Success => '+',
        Tint::Warning => '!',
        Tint::Danger => 'x',
    }
}

/// Render a list the way the browse loop shows it: rows are numbered from 1
/// so they can be picked by index.
pub fn list<T>(view: &ListView<T>) -> String {
    let mut out = String::new();
    let busy = if view.busy { " (working...)" } else { "" };
    let _ = writeln!(out, "== {}{busy} ==", view.title);
    if let Some(b) = &view.banner {
        let _ = writeln!(out, "{}", banner(b));
    }

    match &view.body {
        ListBody::Loading => {
            let _ = writeln!(out, "Loading...");
        }
        ListBody::Error { message } => {
            let _ = writeln!(out, "{message}");
            let _ = writeln!(out, "Use refresh to try again.");
        }
        ListBody::Empty {
            message,
            create_label,
        } => {
            let _ = writeln!(out, "{message}");
            if let Some(label) = create_label {
                let _ = writeln!(out, "  -> {label}");
            }
        }
        ListBody::Populated(rows) => {
            let width = rows.len().to_string().len();
            for (index, row) in rows.iter().enumerate() {
                let _ = write!(
                    out,
                    "{:>width$}. {} {}",
                    index + 1,
                    tint_marker(row.tint),
                    row.label
                );
                if !row.description.is_empty() {
                    let _ = write!(out, "  ({})", row.description);
                }
                let actions: Vec<String> = row
                    .actions
                    .iter()
                    .map(|a| {
                        if a.enabled {
                            format!("[{}]", a.id)
                        } else {
                            format!("[{}: {}]", a.id, a.tooltip)
                        }
                    })
                    .collect();
                if !actions.is_empty() {
                    let _ = write!(out, "  {}", actions.join(" "));
                }
                out.push('\n');
            }
        }
    }

    let mut controls: Vec<String> = Vec::new();
    if let Some(create) = &view.create {
        controls.push(format!("create: {}", create.label));
    }
    controls.extend(view.header.iter().map(|h| format!("{}: {}", h.id, h.label)));
    if !controls.is_empty() {
        let _ = writeln!(out, "({})", controls.join(", "));
    }
    out
}

pub fn dashboard(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::from("== Dashboard ==\n");
    for stat in Stat::ALL {
        let value = match snapshot.get(stat) {
            StatValue::Loading => "loading...".to_string(),
            StatValue::Ready(value) => value.clone(),
            StatValue::Error => "unavailable".to_string(),
        };
        let _ = writeln!(out, "{:<16} {value}", stat.title());
    }
    out
}

pub fn user_details(snapshot: &UserDetailsSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", snapshot.screen_name);
    if let Some(b) = &snapshot.banner {
        let _ = writeln!(out, "{}", banner(b));
    }
    if snapshot.loading {
        let _ = writeln!(out, "Loading...");
        return out;
    }
    if snapshot.deleted {
        let _ = writeln!(out, "This account has been deleted.");
        return out;
    }

    if let Some(user) = &snapshot.user {
        let field = |value: &Option<String>| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .unwrap_or("-")
                .to_string()
        };
        let _ = writeln!(out, "{:<12} {}", "Network", network_label(user.is_icq));
        let _ = writeln!(
            out,
            "{:<12} {}",
            "Status",
            SuspendedStatus::label_of(user.suspended_status.as_ref())
        );
        let _ = writeln!(out, "{:<12} {}", "Email", field(&user.email_address));
        let _ = writeln!(
            out,
            "{:<12} {}",
            "Confirmed",
            if user.confirmed { "yes" } else { "no" }
        );
        let _ = writeln!(out, "{:<12} {}", "Profile", field(&user.profile));
    }

    match snapshot.session_source {
        SessionSource::Unavailable => {
            let _ = writeln!(out, "Sessions: unavailable");
        }
        _ if snapshot.sessions.is_empty() => {
            let _ = writeln!(out, "Sessions: none");
        }
        _ => {
            let _ = writeln!(out, "Sessions:");
            for session in &snapshot.sessions {
                let _ = writeln!(out, "  {}", session.display_description());
            }
        }
    }
    out
}

pub fn composer(composer: &MessageComposer) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "To: {}", composer.target());
    match composer.status() {
        ComposeStatus::Idle => {}
        ComposeStatus::Sending => {
            let _ = writeln!(out, "Sending...");
        }
        ComposeStatus::Sent { .. } | ComposeStatus::Failed(_) => {
            if let Some(b) = composer.banner() {
                let _ = writeln!(out, "{}", banner(&b));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::list::{CrudList, ListConfig};
    use rasman_shared::Category;

    fn categories() -> CrudList<Category> {
        CrudList::new(
            ListConfig::new(
                "Directory Categories",
                |c: &Category| c.id.to_string(),
                |c: &Category| c.name.clone(),
            )
            .icon("material/folder", Tint::Primary),
        )
    }

    #[test]
    fn test_banner_tags() {
        assert_eq!(banner(&Banner::danger("nope")), "[error] nope");
        assert_eq!(banner(&Banner::success("yes")), "[ok] yes");
    }

    #[test]
    fn test_list_states() {
        let list = categories();
        assert!(render_contains(&list, "Loading..."));

        list.apply(Some(vec![]));
        assert!(render_contains(&list, "No directory categories found"));

        list.apply(None);
        assert!(render_contains(
            &list,
            "Failed to load directory categories. Check API connection."
        ));

        list.apply(Some(vec![
            Category {
                id: 1,
                name: "Music".into(),
            },
            Category {
                id: 2,
                name: "Games".into(),
            },
        ]));
        let text = super::list(&list.view());
        assert!(text.contains("1. * Music"));
        assert!(text.contains("2. * Games"));
    }

    fn render_contains(list: &CrudList<Category>, needle: &str) -> bool {
        super::list(&list.view()).contains(needle)
    }

    #[test]
    fn test_dashboard_values() {
        let snapshot = DashboardSnapshot {
            generation: 1,
            values: [
                StatValue::Ready("2".into()),
                StatValue::Loading,
                StatValue::Error,
                StatValue::Ready("0.11.0".into()),
            ],
        };
        let text = dashboard(&snapshot);
        assert!(text.contains("Active Sessions  2"));
        assert!(text.contains("Chat Rooms       loading..."));
        assert!(text.contains("Total Users      unavailable"));
        assert!(text.contains("RAS Version      0.11.0"));
    }
}
