use std::env;

use anyhow::{bail, Context, Result};
use diesel::prelude::*;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use tender_backend::{
    config::AppConfig,
    db,
    domain::OrganizationType,
    models::{Employee, NewEmployee, NewOrganization, NewOrganizationResponsible},
    schema::{employee, organization, organization_responsible},
};

const USAGE: &str = "Usage:
  maintenance migrate
  maintenance add-employee <username> [first-name] [last-name]
  maintenance add-organization <name> <IE|LLC|JSC> [description]
  maintenance assign <username> <organization-id>";

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{USAGE}");
        std::process::exit(1);
    };

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "maintenance",
        database_url = %config.redacted_database_url(),
        "loaded backend configuration"
    );
    let pool = db::init_pool_with_size(&config.database_url, 1)?;
    let mut conn = pool.get().context("failed to get database connection")?;

    let rest = &args[1..];
    match command.as_str() {
        "migrate" => db::run_migrations(&mut conn)?,
        "add-employee" => add_employee(&mut conn, rest)?,
        "add-organization" => add_organization(&mut conn, rest)?,
        "assign" => assign(&mut conn, rest)?,
        other => {
            eprintln!("Unknown command: {other}\n{USAGE}");
            std::process::exit(1);
        }
    }

    Ok(())
}

fn add_employee(conn: &mut PgConnection, args: &[String]) -> Result<()> {
    let Some(username) = args.first() else {
        bail!("add-employee needs a username\n{USAGE}");
    };

    let id = Uuid::new_v4();
    diesel::insert_into(employee::table)
        .values(&NewEmployee {
            id,
            username: username.clone(),
            first_name: args.get(1).cloned(),
            last_name: args.get(2).cloned(),
        })
        .execute(conn)
        .with_context(|| format!("failed to add employee {username}"))?;

    println!("Employee {username} created with id {id}");
    Ok(())
}

fn add_organization(conn: &mut PgConnection, args: &[String]) -> Result<()> {
    let (Some(name), Some(kind)) = (args.first(), args.get(1)) else {
        bail!("add-organization needs a name and a type\n{USAGE}");
    };
    let organization_type: OrganizationType = kind.parse()?;

    let id = Uuid::new_v4();
    diesel::insert_into(organization::table)
        .values(&NewOrganization {
            id,
            name: name.clone(),
            description: args.get(2).cloned(),
            organization_type: organization_type.as_str().to_string(),
        })
        .execute(conn)
        .with_context(|| format!("failed to add organization {name}"))?;

    println!("Organization {name} created with id {id}");
    Ok(())
}

fn assign(conn: &mut PgConnection, args: &[String]) -> Result<()> {
    let (Some(username), Some(raw_org)) = (args.first(), args.get(1)) else {
        bail!("assign needs a username and an organization id\n{USAGE}");
    };
    let organization_id =
        Uuid::parse_str(raw_org).context("organization id must be a UUID")?;

    let member: Employee = employee::table
        .filter(employee::username.eq(username))
        .first(conn)
        .optional()?
        .with_context(|| format!("no employee named {username}"))?;

    let exists: bool = diesel::select(diesel::dsl::exists(
        organization::table.filter(organization::id.eq(organization_id)),
    ))
    .get_result(conn)?;
    if !exists {
        bail!("no organization with id {organization_id}");
    }

    diesel::insert_into(organization_responsible::table)
        .values(&NewOrganizationResponsible {
            id: Uuid::new_v4(),
            organization_id,
            user_id: member.id,
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .context("failed to record responsibility")?;

    println!("{username} is now responsible for organization {organization_id}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
