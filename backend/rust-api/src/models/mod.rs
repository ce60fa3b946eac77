pub mod assessment;
pub mod attempt;
pub mod forms;
pub mod page;
pub mod score;
pub mod session;
pub mod timer;

pub use assessment::{
    Category, Direction, QuestionDefinition, QuestionView, Variant, RESPONSE_MAX, RESPONSE_MIN,
};
pub use attempt::{AnswerEntry, AnswerRecord, AttemptState, AttemptStatus};
pub use score::{Band, CategoryScore, ScoreReport};
pub use session::{
    AssessmentAction, AssessmentSession, AssessmentView, AttemptView, InstructionsView, Screen,
    StudentInfo, StudentInfoForm,
};
