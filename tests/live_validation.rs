use std::{env, sync::Once};

use stututor::{
    completion::{CompletionClient, GeminiClient, GeminiSettings, PromptRequest},
    config,
    processing::{PDF_MEDIA_TYPE, SUMMARY_DIRECTIVE},
};

static INIT: Once = Once::new();

/// Smallest PDF that renders a single line of text.
const HELLO_PDF: &[u8] = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 300 144] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj
4 0 obj << /Length 44 >> stream
BT /F1 18 Tf 20 70 Td (Hello StuTutor) Tj ET
endstream endobj
5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj
trailer << /Root 1 0 R >>
%%EOF
";

fn init_config_once() {
    INIT.call_once(|| {
        if env::var("GEMINI_API_KEY").map(|v| v.trim().is_empty()).unwrap_or(true) {
            panic!("GEMINI_API_KEY must be set for live validation");
        }
        config::init_config();
    });
}

#[tokio::test]
#[ignore = "Requires a live Gemini API key"]
async fn live_gemini_summary_roundtrip() {
    init_config_once();
    let client = GeminiClient::new(GeminiSettings::from(config::get_config())).expect("client");
    let reply = client
        .complete(&PromptRequest {
            document: HELLO_PDF.to_vec(),
            media_type: PDF_MEDIA_TYPE.to_string(),
            instruction: SUMMARY_DIRECTIVE.to_string(),
        })
        .await
        .expect("live completion");
    assert!(!reply.text.trim().is_empty(), "expected generated text");
    assert!(!reply.model.is_empty(), "expected a model identifier");
}
