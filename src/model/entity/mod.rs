mod user;
pub use user::{LeaderboardRow, UserEntity, UserEntityCreateUpdate};

pub(crate) mod course;
pub use course::{
    Course, CourseCreate, CourseFilter, CourseStatsRow, CourseWithInstructorRow, GLOBAL_REGION,
    format_price,
};

mod course_price;
pub use course_price::{CoursePrice, CoursePriceUpsert};

mod course_module;
pub use course_module::{CourseModule, CourseModuleCreate, ModuleWithQuizRow, neighbours};

mod enrollment;
pub use enrollment::{BadgeRow, EnrolledCourseRow, Enrollment};

mod completion;
pub use completion::{Completion, QuizAttempt};

pub mod notification;
pub use notification::{Notification, NotificationCreate};

mod quiz;
pub use quiz::{Question, Quiz, QuizCreate};

mod daily_briefing;
pub use daily_briefing::DailyBriefing;
