use astrohub::model::entity::{
    Course, CourseCreate, CourseModule, CourseModuleCreate, GLOBAL_REGION, Quiz, QuizCreate,
    UserEntity, UserEntityCreateUpdate,
};
use astrohub::model::{CrudRepository, DatabaseError, DbConnection, ModelManager, quiz_format};
use astrohub::web::{AuthenticatedUser, UserRole};
use clap::{Parser, Subcommand};

const DEFAULT_DATABASE_URL: &str = "sqlite://astrodatahub.sqlite?mode=rwc";

#[derive(Parser, Debug)]
#[command(about = "CLI tool for filling the AstroHub catalog", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },

    /// Manage course modules
    Module {
        #[command(subcommand)]
        action: ModuleCommands,
    },

    /// Manage quizzes
    Quiz {
        #[command(subcommand)]
        action: QuizCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Creates a verified account
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "user")]
        role: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    Add {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "Beginner")]
        level: String,
        #[arg(long, default_value = "High School")]
        standard: String,
        #[arg(long, default_value = GLOBAL_REGION)]
        region: String,
        #[arg(long, default_value_t = 0)]
        price_cents: i64,
        #[arg(long, default_value = "USD")]
        currency: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ModuleCommands {
    Add {
        /// Course title to attach the module to
        #[arg(long)]
        course_title: String,
        #[arg(long)]
        title: String,
        /// Path to a text file with the module content
        #[arg(long)]
        file: String,
        #[arg(long)]
        video_url: Option<String>,
        #[arg(long, default_value_t = 1)]
        order: i64,
    },
}

#[derive(Subcommand, Debug)]
pub enum QuizCommands {
    /// Creates a quiz from a file in the admin quiz text format
    Import {
        /// Module title to attach the quiz to
        #[arg(long)]
        module_title: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        file: String,
    },
}

fn fail(message: String) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> astrohub::error::AppResult<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string());
    let db_con = DbConnection::connect(&url)?;
    db_con.migrate().await?;
    let mm = ModelManager::new(db_con);
    let actor = AuthenticatedUser::admin();

    match args.command {
        Commands::User { action } => match action {
            UserCommands::Add {
                username,
                email,
                password,
                role,
            } => {
                let Some(role) = UserRole::parse(&role) else {
                    fail(format!("unknown role `{role}`, expected `user` or `admin`"));
                };
                let user = UserEntity::create(
                    &mm,
                    &actor,
                    UserEntityCreateUpdate {
                        username,
                        email,
                        password_hash: astrohub::auth::hash_password(&password)?,
                        role: role.to_string(),
                        is_verified: true,
                    },
                )
                .await?;
                println!("User created: {} ({})", user.username(), user.id());
            }
        },

        Commands::Course { action } => match action {
            CourseCommands::Add {
                title,
                description,
                subject,
                level,
                standard,
                region,
                price_cents,
                currency,
            } => {
                let course = Course::create(
                    &mm,
                    &actor,
                    CourseCreate {
                        title,
                        description,
                        subject,
                        level,
                        standard,
                        region: region.to_uppercase(),
                        price_cents,
                        currency: currency.to_uppercase(),
                        instructor_id: None,
                    },
                )
                .await?;
                println!("Course created: {} ({})", course.title(), course.id());
            }
        },

        Commands::Module { action } => match action {
            ModuleCommands::Add {
                course_title,
                title,
                file,
                video_url,
                order,
            } => {
                let course_id: Option<uuid::Uuid> =
                    sqlx::query_scalar("SELECT id FROM courses WHERE title = $1 LIMIT 1")
                        .bind(&course_title)
                        .fetch_optional(mm.executor())
                        .await
                        .map_err(DatabaseError::SqlxError)?;
                let Some(course_id) = course_id else {
                    fail(format!("no course titled `{course_title}`"));
                };

                let content = std::fs::read_to_string(file)?;
                let module = CourseModule::create(
                    &mm,
                    &actor,
                    CourseModuleCreate {
                        course_id,
                        module_title: title,
                        module_content: content,
                        video_url,
                        module_order: order,
                    },
                )
                .await?;
                println!("Module created: {} ({})", module.title(), module.id());
            }
        },

        Commands::Quiz { action } => match action {
            QuizCommands::Import {
                module_title,
                title,
                file,
            } => {
                let Some(module) = CourseModule::find_by_title(&mm, &actor, &module_title).await?
                else {
                    fail(format!("no module titled `{module_title}`"));
                };

                let text = std::fs::read_to_string(file)?;
                let questions = match quiz_format::parse(&text) {
                    Ok(questions) => questions,
                    Err(e) => fail(format!("invalid quiz file: {e}")),
                };
                let count = questions.len();
                let quiz = Quiz::create(
                    &mm,
                    &actor,
                    QuizCreate {
                        module_id: module.id(),
                        quiz_title: title,
                        questions,
                    },
                )
                .await?;
                println!("Quiz created: {} with {count} questions ({})", quiz.title(), quiz.id());
            }
        },
    }

    Ok(())
}
