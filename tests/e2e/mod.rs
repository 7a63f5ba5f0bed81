// End-to-end tests for the Voicebox HTTP API
//
// Each test boots the real router on an ephemeral port. The synthesis backend
// is an in-process fake, and speakers and artifacts live in a temp directory
// owned by the test context, so tests run in parallel without sharing state.

mod helpers;
mod test_emotions;
mod test_jobs;
mod test_speak;
