/// Instruction template for grounded question answering.
pub const QA_TEMPLATE: &str = "You are an assistant for question-answering tasks. Use the following pieces of retrieved context to answer the question.
If you don't know the answer, just say that you don't know, don't try to make up an answer.
Use three sentences maximum. Keep the answer as concise as possible.

Summary: {context}
Question: {input}
Answer:";

const CONTEXT_SLOT: &str = "{context}";
const INPUT_SLOT: &str = "{input}";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::new(QA_TEMPLATE)
    }
}

impl PromptTemplate {
    #[inline]
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Fill both slots in a single pass, so braces inside the values are left alone.
    #[inline]
    pub fn render(&self, context: &str, input: &str) -> String {
        let mut rendered =
            String::with_capacity(self.template.len() + context.len() + input.len());
        let mut rest = self.template.as_str();

        loop {
            let next = [(CONTEXT_SLOT, context), (INPUT_SLOT, input)]
                .into_iter()
                .filter_map(|(slot, value)| rest.find(slot).map(|at| (at, slot, value)))
                .min_by_key(|(at, _, _)| *at);

            let Some((at, slot, value)) = next else {
                rendered.push_str(rest);
                return rendered;
            };
            let (before, after) = rest.split_at(at);
            rendered.push_str(before);
            rendered.push_str(value);
            rest = after.strip_prefix(slot).unwrap_or(after);
        }
    }
}
