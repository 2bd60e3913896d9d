//! Analysis prompt template.

/// Build the fixed-structure analysis request for a transcript.
///
/// The generated document must contain five sections: Summary, Key
/// Points, Detailed Breakdown (with timestamps), Conclusion, and
/// Metadata.
pub fn build_analysis_prompt(transcript_text: &str) -> String {
    format!(
        "Please analyze the following transcript and create a detailed markdown document.\n\
         Include the following sections:\n\
         1. Summary\n\
         2. Key Points\n\
         3. Detailed Breakdown (with timestamps if available)\n\
         4. Conclusion\n\
         5. Any relevant metadata (speaker names, video title, etc.)\n\
         \n\
         Transcript:\n\
         {transcript_text}\n"
    )
}
