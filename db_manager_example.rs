//! Walkthrough of every database manager feature
//!
//! Run with: cargo run --bin db_manager_example
//!
//! Uses SQLite `users.db` by default. For MySQL set DB_BACKEND=mysql plus
//! DB_HOST / DB_USER / DB_PASSWORD / DB_DATABASE (a `.env` file works too).

use anyhow::{Context, Result};
use db_manager::logging::init_logging;
use db_manager::{AppConfig, ConnectionConfig, DbManager, Row, Value};

fn print_user_info(user: &Row) {
    println!("User details:");
    println!("- Username: {}", user.get_string_or("username", "unknown"));
    println!("- Email: {}", user.get_string_or("email", "unknown"));
    println!("- Name: {} {}", user.get_string("firstName"), user.get_string("lastName"));
    println!("- Login count: {}", user.get_int("loginCount"));
    println!("- Money: ${}", user.get_double("money"));
    println!("- Active: {}", user.get_bool("active"));
    println!("- Level: {}", user.get_string_or("level", "unknown"));
    println!("- Notes: {}", user.get_string("notes"));
}

async fn run_full_features(database: &DbManager) -> Result<()> {
    println!("Database type: {}", database.database_type());

    if database.is_connected().await {
        println!("Database connection is active.\n");
    } else {
        println!("Database connection failed.\n");
        return Ok(());
    }

    println!("Creating users table...");
    database
        .create_table("users")
        .add_string_len("username", 50)
        .add_string_len("email", 100)
        .add_string("firstName")
        .add_string("lastName")
        .add_integer_default("loginCount", 0)
        .add_double_default("money", 0.0)
        .add_boolean_default("active", false)
        .add_string_default("level", "beginner")
        .add_timestamp("lastLogin")
        .add_text_default("notes", "New user")
        .create_or_replace()
        .await?;

    println!("\nInserting test users...");
    let user1_id = database
        .insert("users")
        .set_string("username", "johndoe")
        .set_string("email", "john@example.com")
        .set_string("firstName", "John")
        .set_string("lastName", "Doe")
        .set_integer("loginCount", 5)
        .set_double("money", 100.0)
        .set_boolean("active", true)
        .set_string("level", "advanced")
        .set_timestamp("lastLogin", chrono::Utc::now().naive_utc())
        .set_string("notes", "Regular user")
        .execute()
        .await?;

    // Defaults fill the remaining columns
    let user2_id = database
        .insert("users")
        .set_string("username", "janedoe")
        .set_string("email", "jane@example.com")
        .set_string("firstName", "Jane")
        .set_string("lastName", "Doe")
        .execute()
        .await?;

    let background = database.spawn(|db| async move {
        db.insert("users")
            .set_string("username", "bobsmith")
            .set_string("email", "bob@example.com")
            .set_string("firstName", "Bob")
            .set_string("lastName", "Smith")
            .set_boolean("active", false)
            .execute()
            .await
    });
    let user3_id = background.await??;
    println!("Async user added with ID: {}", user3_id);

    println!("\nReading user 1 data...");
    if let Some(user) = database.select("users", user1_id).await? {
        print_user_info(&user);
    }

    println!("\nReading user 2 with QueryBuilder...");
    if let Some(user) = database.query("users").where_eq("username", "janedoe").first().await? {
        print_user_info(&user);
    }

    println!("\nActive users with login count > 0:");
    let active_users = database
        .query("users")
        .where_eq("active", true)
        .where_greater_than("loginCount", 0)
        .order_by("money", false)
        .get()
        .await?;
    for user in &active_users {
        println!(
            "- {}: ${}, Login count: {}",
            user.get_string("username"),
            user.get_double("money"),
            user.get_int("loginCount")
        );
    }

    println!("\nUsers with 'doe' in username:");
    for user in database.query("users").where_like("username", "%doe%").get().await? {
        println!(
            "- {} ({} {})",
            user.get_string("username"),
            user.get_string("firstName"),
            user.get_string("lastName")
        );
    }

    println!("\nUsers who are either not active or beginners:");
    for user in database
        .query("users")
        .where_eq("active", false)
        .or_where("level", "beginner")
        .get()
        .await?
    {
        println!(
            "- {} (Active: {}, Level: {})",
            user.get_string("username"),
            user.get_bool("active"),
            user.get_string("level")
        );
    }

    let total_users = database.query("users").count().await?;
    let active_count = database.query("users").where_eq("active", true).count().await?;
    let beginner_count = database.query("users").where_eq("level", "beginner").count().await?;
    println!("\nUser statistics:");
    println!("- Total users: {}", total_users);
    println!("- Active users: {}", active_count);
    println!("- Beginner users: {}", beginner_count);

    println!("\nUpdating user data...");
    let updated = database
        .execute_update(
            "UPDATE users SET loginCount = loginCount + 1, level = ? WHERE id = ?",
            &[Value::from("intermediate"), Value::Int(user2_id)],
        )
        .await?;
    println!("Updated {} rows", updated);

    if let Some(user) = database.select("users", user2_id).await? {
        println!("User after update:");
        println!("- Username: {}", user.get_string("username"));
        println!("- Login count: {}", user.get_int("loginCount"));
        println!("- Level: {}", user.get_string("level"));
    }

    println!("\nTop 2 users with highest money:");
    for user in database.query("users").order_by("money", false).limit(2).get().await? {
        println!("- {}: ${}", user.get_string("username"), user.get_double("money"));
    }

    let users_table_exists = database.table_exists("users").await?;
    println!("\nUsers table exists: {}", users_table_exists);

    println!("\nTruncating users table...");
    database.truncate_table("users").await?;
    let remaining = database.query("users").count().await?;
    println!("Remaining users after truncate: {}", remaining);

    println!("\nClosing database connection...");
    database.close().await?;
    println!("Database operations completed.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let app_config = AppConfig::load();
    init_logging(app_config.log_level.as_deref());

    let connection = match std::env::var("DB_PROFILE") {
        Ok(name) => app_config
            .get_connection(&name)
            .cloned()
            .with_context(|| format!("No saved connection named '{}'", name))?,
        Err(_) => ConnectionConfig::from_env()?,
    };

    let database = DbManager::new(connection);
    if let Err(e) = database.connect().await {
        eprintln!("{}", e);
    }

    println!("{} Database test:", database.database_type());
    println!("====================");
    run_full_features(&database).await
}
