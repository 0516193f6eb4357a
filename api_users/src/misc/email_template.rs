//! Notification sent to customers dropped from the loyalty program.

pub const SUBJECT: &str = "Your loyalty membership has expired";

pub const TEXT: &str = "Hello,\n\n\
we have not seen a purchase from you in a while, so your loyalty membership \
has expired and your residual points have been reset.\n\n\
You can join the program again at any time from your account page.\n";

pub const HTML: &str = "<p>Hello,</p>\
<p>we have not seen a purchase from you in a while, so your loyalty membership \
has expired and your residual points have been reset.</p>\
<p>You can join the program again at any time from your account page.</p>";
