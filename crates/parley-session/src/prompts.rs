//! Mode profiles: the system prompt plus generation defaults for each
//! practice scenario.

use parley_schema::PracticeMode;

#[derive(Debug, Clone, Copy)]
pub struct ModeProfile {
    pub system_prompt: &'static str,
    pub temperature: f64,
    pub max_tokens: u32,
}

const INTERVIEW: ModeProfile = ModeProfile {
    system_prompt: "You are an experienced interviewer running a realistic mock \
interview. Ask one question at a time, follow up on weak or vague answers, and \
keep your own turns short. Stay in character as the interviewer; do not break \
into meta-commentary unless the candidate asks for feedback.",
    temperature: 0.7,
    max_tokens: 1024,
};

const DEBATE: ModeProfile = ModeProfile {
    system_prompt: "You are a sharp debate opponent. Take the opposing side of \
whatever position the user argues, press on logical gaps, and concede points \
that are genuinely well made. Keep each rebuttal under a few sentences.",
    temperature: 0.8,
    max_tokens: 1024,
};

const PRESENTATION: ModeProfile = ModeProfile {
    system_prompt: "You are a presentation coach listening to a practice run. \
React as an attentive audience member: ask clarifying questions a real \
audience would ask, and point out pacing or structure problems when they \
appear.",
    temperature: 0.7,
    max_tokens: 1024,
};

const LANGUAGE: ModeProfile = ModeProfile {
    system_prompt: "You are a patient language-practice partner. Hold a natural \
conversation at the user's level, gently correct mistakes by restating the \
corrected sentence, and keep the conversation moving with simple questions.",
    temperature: 0.6,
    max_tokens: 1024,
};

const GENERAL: ModeProfile = ModeProfile {
    system_prompt: "You are a supportive conversation coach. Help the user \
practice speaking clearly and confidently on whatever topic they bring up.",
    temperature: 0.7,
    max_tokens: 1024,
};

pub fn profile(mode: PracticeMode) -> ModeProfile {
    match mode {
        PracticeMode::InterviewPractice => INTERVIEW,
        PracticeMode::DebateChallenge => DEBATE,
        PracticeMode::PresentationPractice => PRESENTATION,
        PracticeMode::LanguagePractice => LANGUAGE,
        PracticeMode::General => GENERAL,
    }
}
