// View catalog - one descriptor per admin screen
//
// Screens that read through the db-query function carry literal queries;
// everything else is a plain table select.

use crate::actions::ActionKind;
use crate::filter::CategoricalFilter;
use crate::format::FieldFormat;
use crate::query::TableQuery;
use crate::view::{CardSpec, Column, DashboardDescriptor, Paging, ViewDescriptor};

const ROW_ACTIONS: [ActionKind; 3] = [ActionKind::View, ActionKind::Edit, ActionKind::Delete];

pub fn currencies() -> ViewDescriptor {
    ViewDescriptor::new("currencies", "Currencies", "currencies")
        .describe("Currencies available across the platform")
        .select(
            TableQuery::from("currencies")
                .select(&["id", "code", "name", "symbol", "decimal_places", "is_active"])
                .order("name", true),
        )
        .search(&["name", "code"], "Search currencies...")
        .filter(CategoricalFilter::status("is_active"))
        .columns(vec![
            Column::text("Code", "code"),
            Column::text("Name", "name"),
            Column::text("Symbol", "symbol"),
            Column::new("Active", "is_active", FieldFormat::status()),
        ])
}

pub fn languages() -> ViewDescriptor {
    ViewDescriptor::new("languages", "Languages", "languages")
        .describe("Languages available across the platform")
        .select(
            TableQuery::from("languages")
                .select(&["id", "code", "name", "native_name", "is_active"])
                .order("name", true),
        )
        .search(&["name", "native_name", "code"], "Search languages...")
        .filter(CategoricalFilter::status("is_active"))
        .columns(vec![
            Column::text("Code", "code"),
            Column::text("Name", "name"),
            Column::text("Native Name", "native_name"),
            Column::new("Active", "is_active", FieldFormat::status()),
        ])
}

/// Currencies and languages side by side, loaded through db-query.
pub fn localization() -> DashboardDescriptor {
    DashboardDescriptor {
        name: "localization".to_string(),
        title: "Localization".to_string(),
        panels: vec![
            currencies().sql("SELECT * FROM currencies ORDER BY name ASC"),
            languages().sql("SELECT * FROM languages ORDER BY name ASC"),
        ],
    }
}

pub fn tenants() -> ViewDescriptor {
    ViewDescriptor::new("tenants", "Tenants", "tenants")
        .describe("Organizations using the platform")
        .select(
            TableQuery::from("tenants")
                .select(&["id", "name", "domain", "contact_email", "is_active", "created_at"]),
        )
        .search(
            &["name", "domain", "contact_email"],
            "Search tenants by name, domain, or email...",
        )
        .columns(vec![
            Column::text("Name", "name"),
            Column::text("Domain", "domain").optional(),
            Column::text("Contact Email", "contact_email").optional(),
            Column::new("Status", "is_active", FieldFormat::status()),
            Column::new("Created At", "created_at", FieldFormat::Date),
        ])
}

pub fn tenant_details() -> ViewDescriptor {
    ViewDescriptor::new("tenant-details", "Tenant Details", "tenants")
        .describe("Tenants with descriptions, newest first")
        .select(
            TableQuery::from("tenants")
                .select(&["id", "name", "description", "created_at", "is_active"])
                .order("created_at", false),
        )
        .columns(vec![
            Column::text("ID", "id"),
            Column::text("Name", "name"),
            Column::text("Description", "description").optional(),
            Column::new("Created At", "created_at", FieldFormat::Date),
            Column::new("Status", "is_active", FieldFormat::status()),
        ])
        .actions(&ROW_ACTIONS)
}

pub fn roles() -> ViewDescriptor {
    ViewDescriptor::new("roles", "Roles", "roles")
        .describe("Roles that can be granted to users")
        .select(
            TableQuery::from("roles")
                .select(&["role_id", "role_name", "description", "created_at", "updated_at"])
                .order("role_name", true),
        )
        .keyed_by("role_id", "role_name")
        .columns(vec![
            Column::text("Role ID", "role_id"),
            Column::text("Role Name", "role_name"),
            Column::text("Description", "description").optional(),
            Column::new("Created At", "created_at", FieldFormat::DateTime),
            Column::new("Updated At", "updated_at", FieldFormat::DateTime),
        ])
}

pub fn users() -> ViewDescriptor {
    ViewDescriptor::new("users", "Users", "users")
        .describe("Registered users")
        .select(
            TableQuery::from("users")
                .select(&["id", "full_name", "email", "created_at", "last_login_at", "is_active"]),
        )
        .keyed_by("id", "full_name")
        .search(&["full_name", "email"], "Search users...")
        .filter(CategoricalFilter::status("is_active"))
        .columns(vec![
            Column::text("Full Name", "full_name"),
            Column::text("Email", "email"),
            Column::new("Created At", "created_at", FieldFormat::Date),
            Column::new("Last Login", "last_login_at", FieldFormat::DateTime).optional(),
            Column::new("Status", "is_active", FieldFormat::status()),
        ])
}

/// Provider configurations as cards with a status selector.
pub fn ai_provider_configs() -> ViewDescriptor {
    ViewDescriptor::new("ai-provider-configs", "AI Provider Configurations", "ai_provider_configs")
        .describe("Configured AI providers and their models")
        .sql("SELECT * FROM ai_provider_configs ORDER BY created_at DESC")
        .search(&["name", "provider_type"], "Search by name or provider type...")
        .filter(CategoricalFilter::status("is_active"))
        .cards(CardSpec {
            title_field: "name".to_string(),
            subtitle_field: Some("provider_type".to_string()),
            badge: Some(Column::new("Status", "is_active", FieldFormat::status())),
        })
        .columns(vec![
            Column::text("Model", "model_name"),
            Column::text("Base URL", "base_url"),
            Column::text("API Key Name", "api_key_name"),
            Column::text("Org ID", "organization_id").optional(),
            Column::new("Params", "additional_params", FieldFormat::Json).optional(),
            Column::new("Created", "created_at", FieldFormat::Date),
        ])
        .empty("No AI provider configurations found.")
        .actions(&[ActionKind::Edit, ActionKind::Delete])
}

pub fn ai_providers() -> ViewDescriptor {
    ViewDescriptor::new("ai-providers", "AI Providers", "ai_provider_configs")
        .describe("AI providers in a compact table")
        .sql("SELECT * FROM ai_provider_configs ORDER BY created_at DESC")
        .columns(vec![
            Column::text("Name", "name"),
            Column::text("Type", "provider_type"),
            Column::text("Model", "model_name"),
            Column::text("Base URL", "base_url"),
            Column::new("Active", "is_active", FieldFormat::status()),
        ])
        .empty("No AI providers found.")
        .actions(&[ActionKind::Edit, ActionKind::View, ActionKind::Delete])
}

/// Players, one backend window per page.
pub fn players(per_page: usize) -> ViewDescriptor {
    ViewDescriptor::new("players", "Players", "players")
        .describe("Registered players, newest first")
        .select(
            TableQuery::from("players")
                .select(&["id", "first_name", "last_name", "email", "created_at"])
                .order("created_at", false),
        )
        .keyed_by("id", "email")
        .search(&["first_name", "last_name", "email"], "Search players...")
        .columns(vec![
            Column::text("ID", "id"),
            Column::text("First Name", "first_name"),
            Column::text("Last Name", "last_name"),
            Column::text("Email", "email"),
            Column::new("Created At", "created_at", FieldFormat::Date),
        ])
        .paging(Paging::Server { per_page })
        .empty("No players available. Create a new player to get started!")
        .actions(&ROW_ACTIONS)
}

/// Languages narrowed to one pick from a selector built from the rows.
pub fn language_selector() -> ViewDescriptor {
    ViewDescriptor::new("language-selector", "Languages by Selection", "languages")
        .describe("Search languages or pick a single one")
        .select(
            TableQuery::from("languages")
                .select(&["id", "name", "code"])
                .order("name", true),
        )
        .search(&["name", "code"], "Search by language name or code...")
        .filter(CategoricalFilter::by_record("id", "Languages", &["name", "code"]))
        .columns(vec![
            Column::text("Language Name", "name"),
            Column::text("Language Code", "code"),
        ])
        .empty("No languages found with the current filters.")
}

/// Every single-collection view, in menu order.
pub fn all(per_page: usize) -> Vec<ViewDescriptor> {
    vec![
        currencies(),
        languages(),
        tenants(),
        tenant_details(),
        roles(),
        users(),
        ai_provider_configs(),
        ai_providers(),
        players(per_page),
        language_selector(),
    ]
}

pub fn dashboards() -> Vec<DashboardDescriptor> {
    vec![localization()]
}

pub fn find(name: &str, per_page: usize) -> Option<ViewDescriptor> {
    all(per_page).into_iter().find(|v| v.name == name)
}

pub fn find_dashboard(name: &str) -> Option<DashboardDescriptor> {
    dashboards().into_iter().find(|d| d.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DataClient;
    use crate::db::{seed_demo_data, SqliteClient};
    use crate::view::{card_lines, Dashboard, DisplayState, Layout, ListView, ViewControls};
    use std::collections::HashSet;
    use std::sync::Arc;

    fn seeded() -> Arc<dyn DataClient> {
        let client = SqliteClient::open_in_memory("demo").unwrap();
        client.with_connection(|conn| seed_demo_data(conn, false)).unwrap();
        Arc::new(client)
    }

    #[test]
    fn test_names_are_unique() {
        let mut names = HashSet::new();
        for view in all(10) {
            assert!(names.insert(view.name.clone()), "duplicate view {}", view.name);
        }
        for dashboard in dashboards() {
            assert!(names.insert(dashboard.name.clone()));
        }
        assert!(find("players", 10).is_some());
        assert!(find("nope", 10).is_none());
        assert!(find_dashboard("localization").is_some());
    }

    #[test]
    fn test_every_view_loads_from_seeded_sqlite() {
        let client = seeded();
        for descriptor in all(10) {
            let name = descriptor.name.clone();
            let mut view = ListView::new(descriptor, Arc::clone(&client), "demo");
            view.load().unwrap_or_else(|e| panic!("{} failed: {}", name, e));
            assert!(
                matches!(view.display(), DisplayState::Rows(_)),
                "{} shows no rows",
                name
            );
        }
    }

    #[test]
    fn test_localization_dashboard_loads_both_panels() {
        let mut dashboard = Dashboard::new(localization(), seeded(), "demo");
        dashboard.load().unwrap();
        assert_eq!(dashboard.loader().records(0).len(), 5);
        assert_eq!(dashboard.loader().records(1).len(), 5);
    }

    #[test]
    fn test_db_query_views_need_the_connection() {
        let mut view = ListView::new(ai_provider_configs(), seeded(), "other");
        assert!(view.load().is_err());
        assert_eq!(
            view.display(),
            DisplayState::Error {
                message: "No active database connection found".to_string(),
                retryable: true
            }
        );
    }

    #[test]
    fn test_ai_configs_are_cards_with_status_filter() {
        let descriptor = ai_provider_configs();
        assert_eq!(descriptor.layout, Layout::Cards);
        assert!(descriptor.filter.is_some());

        let mut view = ListView::new(descriptor, seeded(), "demo");
        view.load().unwrap();
        let total = view.records().len();
        view.set_filter(Some("inactive"));
        let DisplayState::Rows(page) = view.display() else {
            panic!("expected an inactive config in the demo data");
        };
        assert!(page.items.len() < total);
        assert!(page.items.iter().all(|r| r.flag("is_active") == Some(false)));

        let ollama = page.items[0];
        let params = card_lines(view.descriptor(), ollama)
            .into_iter()
            .find(|(label, _)| label == "Params")
            .map(|(_, cell)| cell.text().to_string());
        assert_eq!(params.as_deref(), Some(r#"{"num_ctx":8192}"#));
    }

    #[test]
    fn test_players_empty_message() {
        let client = Arc::new(crate::client::MemoryClient::new().with_collection("players", Vec::new()));
        let mut view = ListView::new(players(10), client, "demo");
        view.load().unwrap();
        assert_eq!(
            view.display(),
            DisplayState::Empty {
                message: "No players available. Create a new player to get started!".to_string()
            }
        );
    }

    #[test]
    fn test_players_page_through_backend() {
        let mut view = ListView::new(players(10), seeded(), "demo");
        view.load().unwrap();
        assert_eq!(view.records().len(), 10);
        let meta = view.page_meta().unwrap();
        assert_eq!((meta.total, meta.total_pages), (25, 3));

        assert!(view.next_page());
        view.load().unwrap();
        assert_eq!(view.records().len(), 10);

        assert!(view.next_page());
        view.load().unwrap();
        assert_eq!(view.records().len(), 5);
        assert!(!view.next_page());
    }

    #[test]
    fn test_players_page_past_the_end_shows_last_page() {
        let controls = ViewControls {
            page: 99,
            ..ViewControls::default()
        };
        let mut view = ListView::new(players(10), seeded(), "demo").with_controls(controls);
        view.load().unwrap();

        let meta = view.page_meta().unwrap();
        assert_eq!((meta.page, meta.total_pages, meta.total), (3, 3, 25));
        assert_eq!(view.records().len(), 5);
    }

    #[test]
    fn test_language_selector_picks_one() {
        let mut view = ListView::new(language_selector(), seeded(), "demo");
        view.load().unwrap();

        let options = view.filter_options();
        assert_eq!(options[0].label, "All Languages");
        assert_eq!(options.len(), 6);

        let pick = options[1].clone();
        view.set_filter(Some(&pick.key));
        let DisplayState::Rows(page) = view.display() else {
            panic!("expected rows");
        };
        assert_eq!(page.items.len(), 1);
        assert!(pick.label.contains('('));
    }
}
