//! `generate`, `refactor`, `explain`, `test-gen` and `docs` commands.

use crate::output::{emit, read_input};
use lm_tools::{CodeGenerationRequest, CodeGenerator, DetailLevel, detect_language};
use std::path::Path;

pub async fn generate(
    generator: &CodeGenerator,
    request: &CodeGenerationRequest,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let code = generator.generate_code(request).await?;
    emit(output, &code).await
}

pub async fn refactor(
    generator: &CodeGenerator,
    file: &Path,
    instructions: &str,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let code = read_input(file).await?;
    let refactored = generator.refactor_code(&code, instructions).await?;
    emit(output, &refactored).await
}

pub async fn explain(
    generator: &CodeGenerator,
    file: &Path,
    detail: DetailLevel,
) -> anyhow::Result<()> {
    let code = read_input(file).await?;
    let explanation = generator.explain_code(&code, detail).await?;
    emit(None, &explanation).await
}

pub async fn test_gen(
    generator: &CodeGenerator,
    file: &Path,
    language: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let code = read_input(file).await?;
    let language = language.unwrap_or_else(|| detect_language(&code));
    let tests = generator.generate_tests(&code, language).await?;
    emit(output, &tests).await
}

pub async fn docs(
    generator: &CodeGenerator,
    file: &Path,
    language: Option<&str>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let code = read_input(file).await?;
    let language = language.unwrap_or_else(|| detect_language(&code));
    let docs = generator.generate_documentation(&code, language).await?;
    emit(output, &docs).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CannedClient;
    use std::sync::Arc;

    #[tokio::test]
    async fn generated_code_is_written_without_fences() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = dir.path().join("stack.py");
        let client = Arc::new(CannedClient::new(
            "Here:\n```python\nclass Stack:\n    pass\n```\n",
        ));
        let generator = CodeGenerator::new(client.clone(), None);

        generate(
            &generator,
            &CodeGenerationRequest::new("a stack"),
            Some(&output),
        )
        .await
        .expect("generate");

        assert_eq!(
            std::fs::read_to_string(output).expect("output"),
            "class Stack:\n    pass"
        );
        assert!(client.prompts()[0].contains("Description: a stack"));
    }

    #[tokio::test]
    async fn test_generation_detects_language_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("app.js");
        let output = dir.path().join("app.test.js");
        std::fs::write(&source, "function add(a, b) { return a + b; }").expect("write source");
        let client = Arc::new(CannedClient::new("```javascript\ntest('add', () => {});\n```"));
        let generator = CodeGenerator::new(client.clone(), None);

        test_gen(&generator, &source, None, Some(&output))
            .await
            .expect("tests");

        assert_eq!(
            std::fs::read_to_string(output).expect("output"),
            "test('add', () => {});"
        );
        assert!(client.prompts()[0].contains("following javascript code"));
    }

    #[tokio::test]
    async fn missing_input_file_is_reported() {
        let generator = CodeGenerator::new(Arc::new(CannedClient::new("x")), None);
        let err = explain(&generator, Path::new("/definitely/not/here.py"), DetailLevel::Low)
            .await
            .err()
            .expect("read error");
        assert!(err.to_string().contains("read input"));
    }
}
