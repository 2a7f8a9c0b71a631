use crate::chunking::TextChunk;
use crate::retrieval::RetrievalError;

/// Separator placed between retrieved chunks
pub const DEFAULT_SEPARATOR: &str = " ";

/// Join the retrieved chunks into the context handed to the language model.
///
/// Chunks appear in ranked order, most relevant first, not in document order.
pub fn assemble_context(
    chunks: &[TextChunk],
    ranked: &[usize],
    separator: &str,
) -> Result<String, RetrievalError> {
    let texts = ranked
        .iter()
        .map(|&index| {
            chunks
                .get(index)
                .map(|chunk| chunk.text.as_str())
                .ok_or(RetrievalError::IndexOutOfRange {
                    index,
                    len: chunks.len(),
                })
        })
        .collect::<Result<Vec<&str>, RetrievalError>>()?;

    Ok(texts.join(separator))
}
